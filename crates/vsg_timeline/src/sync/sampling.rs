//! Sampling plans: where on the reference timeline delays are measured.

use crate::config::{SamplingSettings, StrategySettings};

/// Evenly spaced sample times (seconds) inside the scan window.
///
/// Returns an empty plan when the window is empty.
pub fn chunk_times(duration_s: f64, settings: &SamplingSettings) -> Vec<f64> {
    let start = duration_s * (settings.scan_start_pct / 100.0);
    let end = duration_s * (settings.scan_end_pct / 100.0);
    let usable = end - start;

    if !(usable > 0.0) || settings.chunk_count == 0 {
        return Vec::new();
    }
    if settings.chunk_count == 1 {
        return vec![start + usable / 2.0];
    }

    let step = usable / (settings.chunk_count - 1) as f64;
    (0..settings.chunk_count)
        .map(|i| start + i as f64 * step)
        .collect()
}

/// Dense sample windows centred on fixed percentages of the duration.
///
/// Each anchor contributes `anchor_window_samples` times spaced
/// `anchor_window_spacing_s` apart. Times are clamped into the programme,
/// sorted and deduplicated.
pub fn anchor_window_times(duration_s: f64, settings: &StrategySettings) -> Vec<f64> {
    if !(duration_s > 0.0) {
        return Vec::new();
    }

    let n = settings.anchor_window_samples.max(1);
    let half_span = (n - 1) as f64 / 2.0;
    let mut times: Vec<f64> = settings
        .anchor_positions_pct
        .iter()
        .flat_map(|pct| {
            let centre = duration_s * pct / 100.0;
            (0..n).map(move |i| centre + (i as f64 - half_span) * settings.anchor_window_spacing_s)
        })
        .map(|t| t.clamp(0.0, duration_s))
        .collect();

    times.sort_by(f64::total_cmp);
    times.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    times
}

/// Pick checkpoint times (ms) from subtitle event starts.
///
/// Events in the first and last `edge_exclusion_pct` of the programme are
/// skipped (openings and endings are often re-cut). `count` checkpoints
/// are then picked evenly from what remains.
pub fn subtitle_checkpoints(
    hints_ms: &[f64],
    duration_ms: f64,
    edge_exclusion_pct: f64,
    count: usize,
) -> Vec<f64> {
    let lo = duration_ms * edge_exclusion_pct / 100.0;
    let hi = duration_ms * (1.0 - edge_exclusion_pct / 100.0);

    let mut candidates: Vec<f64> = hints_ms
        .iter()
        .copied()
        .filter(|t| t.is_finite() && *t >= lo && *t <= hi)
        .collect();
    candidates.sort_by(f64::total_cmp);
    candidates.dedup();

    if count == 0 || candidates.is_empty() {
        return Vec::new();
    }
    if candidates.len() <= count {
        return candidates;
    }
    if count == 1 {
        return vec![candidates[candidates.len() / 2]];
    }

    let last = (candidates.len() - 1) as f64;
    let mut picked: Vec<f64> = (0..count)
        .map(|i| {
            let idx = (i as f64 * last / (count - 1) as f64).round() as usize;
            candidates[idx]
        })
        .collect();
    picked.dedup();
    picked
}
