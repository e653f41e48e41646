//! Chapter boundary snapping.
//!
//! Moves chapter boundaries onto anchors (scene cuts or keyframes) so
//! that seeking to a chapter lands on a clean picture. A boundary with no
//! anchor inside the tolerance stays where it is; chapters are never
//! dropped, reordered or renamed.

use serde::Serialize;

use super::types::{format_timestamp_ms, AnchorSet, Chapter};
use crate::config::ChapterSettings;
use crate::models::SnapMode;

/// Boundaries closer than this to an anchor already sit on it.
const ALIGNED_EPSILON_MS: f64 = 1e-6;

/// How boundaries are snapped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapSettings {
    pub mode: SnapMode,
    /// Maximum distance a boundary may move.
    pub tolerance_ms: f64,
    /// Leave end times alone.
    pub starts_only: bool,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self::from(&ChapterSettings::default())
    }
}

impl From<&ChapterSettings> for SnapSettings {
    fn from(settings: &ChapterSettings) -> Self {
        Self {
            mode: if settings.snap_enabled {
                settings.snap_mode
            } else {
                SnapMode::None
            },
            tolerance_ms: settings.snap_threshold_ms,
            starts_only: settings.snap_starts_only,
        }
    }
}

/// Statistics about one snapping pass. Counts are per boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapStats {
    pub chapter_count: usize,
    pub moved: usize,
    pub already_aligned: usize,
    /// No anchor within tolerance (or none in the allowed direction).
    pub too_far: usize,
    /// Move rejected because it would reorder chapters.
    pub blocked: usize,
    pub max_shift_ms: f64,
}

#[derive(Debug, Clone, Copy)]
enum Proposal {
    Aligned,
    TooFar,
    Move(f64),
}

fn propose(time_ms: f64, anchors: &AnchorSet, settings: &SnapSettings) -> Proposal {
    let candidate = match settings.mode {
        SnapMode::Previous => anchors.previous(time_ms),
        SnapMode::Next => anchors.next(time_ms),
        SnapMode::Nearest => anchors.nearest(time_ms),
        SnapMode::None => return Proposal::Aligned,
    };
    match candidate {
        Some(anchor) if (anchor - time_ms).abs() <= ALIGNED_EPSILON_MS => Proposal::Aligned,
        Some(anchor) if (anchor - time_ms).abs() <= settings.tolerance_ms => Proposal::Move(anchor),
        _ => Proposal::TooFar,
    }
}

/// Snap chapter boundaries to anchors. Chapters are expected in start
/// order; the output has the same count and order.
pub fn snap_chapters(
    chapters: &[Chapter],
    anchors: &AnchorSet,
    settings: &SnapSettings,
) -> (Vec<Chapter>, SnapStats) {
    let mut stats = SnapStats {
        chapter_count: chapters.len(),
        ..Default::default()
    };
    if settings.mode == SnapMode::None || anchors.is_empty() {
        if settings.mode != SnapMode::None {
            tracing::warn!("[ChapterSnap] No anchors available, chapters left as-is");
        }
        return (chapters.to_vec(), stats);
    }

    tracing::debug!(
        "[ChapterSnap] Snapping {} chapters to {} anchors (mode: {:?}, tolerance: {:.0}ms)",
        chapters.len(),
        anchors.len(),
        settings.mode,
        settings.tolerance_ms
    );

    let proposals: Vec<Proposal> = chapters
        .iter()
        .map(|c| propose(c.start_ms, anchors, settings))
        .collect();
    // Lowest position the next chapter can end up at, whether or not its
    // own move is accepted.
    let floor_of = |i: usize| -> Option<f64> {
        let chapter = chapters.get(i)?;
        Some(match proposals[i] {
            Proposal::Move(to) => to.min(chapter.start_ms),
            _ => chapter.start_ms,
        })
    };

    let mut out: Vec<Chapter> = Vec::with_capacity(chapters.len());
    for (i, chapter) in chapters.iter().enumerate() {
        let mut snapped = chapter.clone();
        match proposals[i] {
            Proposal::Aligned => stats.already_aligned += 1,
            Proposal::TooFar => stats.too_far += 1,
            Proposal::Move(to) => {
                let after_previous = out.last().map_or(true, |p| to >= p.start_ms);
                let before_next = floor_of(i + 1).map_or(true, |next| to <= next);
                if after_previous && before_next {
                    tracing::trace!(
                        "[ChapterSnap] '{}': {} -> {} ({:+.0}ms)",
                        chapter.title,
                        format_timestamp_ms(chapter.start_ms),
                        format_timestamp_ms(to),
                        to - chapter.start_ms
                    );
                    stats.moved += 1;
                    stats.max_shift_ms = stats.max_shift_ms.max((to - chapter.start_ms).abs());
                    snapped.start_ms = to;
                } else {
                    stats.blocked += 1;
                }
            }
        }

        if !settings.starts_only {
            if let Some(end) = chapter.end_ms {
                match propose(end, anchors, settings) {
                    Proposal::Aligned => stats.already_aligned += 1,
                    Proposal::TooFar => stats.too_far += 1,
                    Proposal::Move(to) if to > snapped.start_ms => {
                        stats.moved += 1;
                        stats.max_shift_ms = stats.max_shift_ms.max((to - end).abs());
                        snapped.end_ms = Some(to);
                    }
                    Proposal::Move(_) => stats.blocked += 1,
                }
            }
        }
        out.push(snapped);
    }

    tracing::info!(
        "[ChapterSnap] {} moved, {} already aligned, {} beyond {:.0}ms, max shift {:.0}ms",
        stats.moved,
        stats.already_aligned,
        stats.too_far,
        settings.tolerance_ms,
        stats.max_shift_ms
    );
    (out, stats)
}
