//! Correction classifier.
//!
//! Turns noisy `(time, delay, confidence)` samples into a verdict:
//!
//! 1. **UNIFORM** when one constant sits within `uniform_tolerance_ms` of
//!    every usable sample.
//! 2. A single drift line (linear or PAL) fitted within tolerance across
//!    all samples becomes a one-segment EDL.
//! 3. Otherwise the samples are split wherever consecutive delays jump by
//!    more than `step_threshold_ms`. Short runs are merged into a
//!    neighbour, each run is fitted with a constant or a drift line, and
//!    the runs become the segments of an EDL: **STEPPED**.
//! 4. **FAILED** when there are too few usable samples or a fitted segment
//!    still misses a sample by more than the tolerance.
//!
//! FAILED is returned, never retried here. Falling back to a simpler
//! strategy is the caller's decision.

use serde::Serialize;

use super::edl::{AudioSegment, Edl};
use super::fit::{is_pal_drift, linear_regression, max_residual, weighted_mean, LinearFit};
use super::types::{CorrectionResult, DelaySample};
use crate::config::ClassifierSettings;
use crate::error::{FailureCause, TimelineResult};
use crate::models::MergePreference;

/// Slack for float noise when comparing a residual with its tolerance.
const RESIDUAL_EPSILON: f64 = 1e-9;

/// Timeline facts the samples alone do not carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifyOptions {
    /// Start of the target range the EDL must cover.
    pub timeline_start_s: f64,
    /// End of that range; defaults to the last usable sample.
    pub timeline_end_s: Option<f64>,
    /// Reference frame rate, used to recognise PAL speed-up drift.
    pub reference_fps: Option<f64>,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            timeline_start_s: 0.0,
            timeline_end_s: None,
            reference_fps: None,
        }
    }
}

/// Kind of drift found in a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    None,
    Linear,
    /// Linear drift matching 23.976 -> 25 fps speed-up.
    Pal,
}

/// Per-segment fit details, for logs and reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentReport {
    pub start_s: f64,
    pub end_s: f64,
    pub samples: usize,
    pub residual_ms: f64,
    pub drift: DriftKind,
}

/// Classifier output.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub result: CorrectionResult,
    /// Samples that passed the confidence filter.
    pub usable_samples: usize,
    /// Empty unless the samples were segmented.
    pub segments: Vec<SegmentReport>,
}

impl Classification {
    fn new(result: CorrectionResult, usable_samples: usize) -> Self {
        Self {
            result,
            usable_samples,
            segments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Model {
    Constant(f64),
    Linear(LinearFit),
}

impl Model {
    fn at(&self, t_s: f64) -> f64 {
        match self {
            Model::Constant(delay) => *delay,
            Model::Linear(fit) => fit.at(t_s),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SegmentFit {
    model: Model,
    residual_ms: f64,
}

/// Classify delay samples.
///
/// Returns `Err` only when EDL assembly breaks the contiguity invariant,
/// which indicates a bug rather than bad input.
pub fn classify(
    samples: &[DelaySample],
    settings: &ClassifierSettings,
    options: &ClassifyOptions,
) -> TimelineResult<Classification> {
    let mut usable: Vec<DelaySample> = samples
        .iter()
        .copied()
        .filter(|s| s.is_finite() && s.confidence > 0.0 && s.confidence >= settings.min_confidence)
        .collect();
    usable.sort_by(|a, b| a.timestamp_s.total_cmp(&b.timestamp_s));

    if usable.len() < samples.len() {
        tracing::debug!(
            "[Classifier] {} of {} samples usable (min confidence {:.2})",
            usable.len(),
            samples.len(),
            settings.min_confidence
        );
    }

    let required = settings.min_samples.max(1);
    if usable.len() < required {
        let cause = FailureCause::InsufficientSamples {
            usable: usable.len(),
            required,
        };
        tracing::warn!("[Classifier] FAILED: {}", cause);
        return Ok(Classification::new(CorrectionResult::failed(cause), usable.len()));
    }

    let tolerance = settings.uniform_tolerance_ms;
    let (constant, residual) = constant_fit(&usable, tolerance);
    if residual <= tolerance + RESIDUAL_EPSILON {
        tracing::info!(
            "[Classifier] UNIFORM {:+.3}ms over {} samples (max residual {:.2}ms)",
            constant,
            usable.len(),
            residual
        );
        return Ok(Classification::new(CorrectionResult::uniform(constant), usable.len()));
    }

    let start_s = options.timeline_start_s.min(usable[0].timestamp_s);
    let last_t = usable[usable.len() - 1].timestamp_s;
    let end_s = options.timeline_end_s.map_or(last_t, |end| end.max(last_t));

    // Steady drift moves every consecutive delta past the step threshold,
    // so it has to be recognised before the step scan.
    let whole = fit_segment(&usable, settings);
    let groups = match whole.model {
        Model::Linear(line) if whole.residual_ms <= tolerance + RESIDUAL_EPSILON => {
            tracing::info!(
                "[Classifier] Drift {:+.3}ms/s across all {} samples (R²={:.4})",
                line.slope,
                usable.len(),
                line.r_squared
            );
            vec![usable.clone()]
        }
        _ => {
            let mut groups = split_at_steps(&usable, settings.step_threshold_ms);
            tracing::debug!("[Classifier] {} raw segment(s) after step scan", groups.len());

            merge_short_groups(&mut groups, settings, start_s, end_s);
            coalesce_agreeing_groups(&mut groups, settings);
            groups
        }
    };

    let fits: Vec<SegmentFit> = groups.iter().map(|g| fit_segment(g, settings)).collect();

    if let Some((index, fit)) = fits
        .iter()
        .enumerate()
        .find(|(_, fit)| fit.residual_ms > tolerance + RESIDUAL_EPSILON)
    {
        let cause = FailureCause::UnresolvableResidual {
            segment: index,
            residual_ms: fit.residual_ms,
            tolerance_ms: tolerance,
        };
        tracing::warn!("[Classifier] FAILED: {}", cause);
        return Ok(Classification::new(CorrectionResult::failed(cause), usable.len()));
    }

    let bounds = group_bounds(&groups, start_s, end_s);
    let mut segments = Vec::with_capacity(groups.len());
    let mut reports = Vec::with_capacity(groups.len());

    for ((group, fit), &(seg_start, seg_end)) in groups.iter().zip(&fits).zip(&bounds) {
        let (segment, drift) = match fit.model {
            Model::Constant(delay) => (AudioSegment::new(seg_start, seg_end, delay), DriftKind::None),
            Model::Linear(line) => {
                let drift = if is_pal_drift(line.slope, options.reference_fps) {
                    tracing::info!(
                        "[Classifier] PAL drift {:+.2}ms/s in segment starting {:.1}s",
                        line.slope,
                        seg_start
                    );
                    DriftKind::Pal
                } else {
                    DriftKind::Linear
                };
                (
                    AudioSegment::with_drift(seg_start, seg_end, line.at(seg_start), line.slope),
                    drift,
                )
            }
        };
        reports.push(SegmentReport {
            start_s: seg_start,
            end_s: seg_end,
            samples: group.len(),
            residual_ms: fit.residual_ms,
            drift,
        });
        segments.push(segment);
    }

    let edl = Edl::new(segments)?;
    let result = CorrectionResult::stepped(edl);
    tracing::info!("[Classifier] {}", result.summary());

    Ok(Classification {
        result,
        usable_samples: usable.len(),
        segments: reports,
    })
}

/// Best constant for `samples`: the weighted mean, pulled into the band of
/// constants that are within `tolerance` of every sample when that band
/// exists.
fn constant_fit(samples: &[DelaySample], tolerance: f64) -> (f64, f64) {
    let estimate = weighted_mean(samples);
    let (min, max) = samples.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
        (lo.min(s.delay_ms), hi.max(s.delay_ms))
    });
    let (band_low, band_high) = (max - tolerance, min + tolerance);
    let constant = if band_low <= band_high {
        estimate.clamp(band_low, band_high)
    } else {
        estimate
    };
    (constant, max_residual(samples, |_| constant))
}

fn fit_segment(samples: &[DelaySample], settings: &ClassifierSettings) -> SegmentFit {
    let (constant, constant_residual) = constant_fit(samples, settings.uniform_tolerance_ms);
    let constant_fit = SegmentFit {
        model: Model::Constant(constant),
        residual_ms: constant_residual,
    };

    if samples.len() < settings.drift_min_samples {
        return constant_fit;
    }
    let Some(line) = linear_regression(samples) else {
        return constant_fit;
    };

    let line_residual = max_residual(samples, |t| line.at(t));
    let is_real_drift = line.slope.abs() >= settings.min_drift_rate_ms_s
        && line.r_squared >= settings.drift_r2_threshold;

    if is_real_drift && line_residual < constant_residual {
        SegmentFit {
            model: Model::Linear(line),
            residual_ms: line_residual,
        }
    } else {
        constant_fit
    }
}

/// Split wherever consecutive delays differ by more than `threshold`.
fn split_at_steps(samples: &[DelaySample], threshold: f64) -> Vec<Vec<DelaySample>> {
    let mut groups: Vec<Vec<DelaySample>> = Vec::new();
    let mut current = vec![samples[0]];
    for pair in samples.windows(2) {
        if (pair[1].delay_ms - pair[0].delay_ms).abs() > threshold {
            tracing::debug!(
                "[Classifier] Step {:+.1}ms between {:.2}s and {:.2}s",
                pair[1].delay_ms - pair[0].delay_ms,
                pair[0].timestamp_s,
                pair[1].timestamp_s
            );
            groups.push(std::mem::take(&mut current));
        }
        current.push(pair[1]);
    }
    groups.push(current);
    groups
}

/// Segment extents: boundaries sit midway between the last sample of one
/// group and the first sample of the next.
fn group_bounds(groups: &[Vec<DelaySample>], start_s: f64, end_s: f64) -> Vec<(f64, f64)> {
    let mut boundaries = Vec::with_capacity(groups.len() + 1);
    boundaries.push(start_s);
    for pair in groups.windows(2) {
        let last = pair[0][pair[0].len() - 1].timestamp_s;
        let first = pair[1][0].timestamp_s;
        boundaries.push((last + first) / 2.0);
    }
    boundaries.push(end_s);
    boundaries.windows(2).map(|w| (w[0], w[1])).collect()
}

fn is_short(group: &[DelaySample], bounds: (f64, f64), settings: &ClassifierSettings) -> bool {
    group.len() < settings.min_segment_samples || bounds.1 - bounds.0 < settings.min_segment_duration_s
}

fn merged_residual(a: &[DelaySample], b: &[DelaySample], settings: &ClassifierSettings) -> f64 {
    let combined: Vec<DelaySample> = a.iter().chain(b).copied().collect();
    fit_segment(&combined, settings).residual_ms
}

fn merge_short_groups(
    groups: &mut Vec<Vec<DelaySample>>,
    settings: &ClassifierSettings,
    start_s: f64,
    end_s: f64,
) {
    while groups.len() > 1 {
        let bounds = group_bounds(groups, start_s, end_s);
        let Some(i) = (0..groups.len()).find(|&i| is_short(&groups[i], bounds[i], settings)) else {
            break;
        };

        let has_prev = i > 0;
        let has_next = i + 1 < groups.len();
        let into_prev = match (has_prev, has_next) {
            (true, false) => true,
            (false, _) => false,
            (true, true) => match settings.merge_preference {
                MergePreference::Earlier => true,
                MergePreference::Later => false,
                MergePreference::LowerResidual => {
                    let prev = merged_residual(&groups[i - 1], &groups[i], settings);
                    let next = merged_residual(&groups[i], &groups[i + 1], settings);
                    prev <= next
                }
            },
        };

        let short = groups.remove(i);
        tracing::debug!(
            "[Classifier] Merging short segment ({} sample(s), {:.2}s) into {} neighbour",
            short.len(),
            bounds[i].1 - bounds[i].0,
            if into_prev { "previous" } else { "next" }
        );
        if into_prev {
            groups[i - 1].extend(short);
        } else {
            let mut merged = short;
            merged.append(&mut groups[i]);
            groups[i] = merged;
        }
    }
}

/// Join neighbours that no longer differ by a real step, typically left
/// behind after an outlier run was merged away.
fn coalesce_agreeing_groups(groups: &mut Vec<Vec<DelaySample>>, settings: &ClassifierSettings) {
    let mut i = 0;
    while i + 1 < groups.len() {
        let left = fit_segment(&groups[i], settings);
        let right = fit_segment(&groups[i + 1], settings);
        let boundary_t = groups[i + 1][0].timestamp_s;

        let both_constant = matches!(left.model, Model::Constant(_))
            && matches!(right.model, Model::Constant(_));
        let agree = (left.model.at(boundary_t) - right.model.at(boundary_t)).abs()
            <= settings.step_threshold_ms;

        if both_constant
            && agree
            && merged_residual(&groups[i], &groups[i + 1], settings)
                <= settings.uniform_tolerance_ms + RESIDUAL_EPSILON
        {
            let mut next = groups.remove(i + 1);
            groups[i].append(&mut next);
        } else {
            i += 1;
        }
    }
}
