//! Scene-change anchor finder.
//!
//! An anchor is the last frame *before* a content cut. Cuts are the only
//! frame-accurate, content-independent reference points two encodes of
//! the same programme share, which makes them the ground truth for
//! verification and chapter snapping.

use std::path::Path;

use super::detector::{DetectionParams, SceneDetector};
use crate::config::SceneSettings;
use crate::frame_utils::Timebase;
use crate::models::RoundingPolicy;

/// Fewer anchors than this triggers the single sensitive retry.
const MIN_USEFUL_ANCHORS: usize = 2;

/// One anchor search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorSearch {
    pub start_frame: u32,
    pub end_frame: u32,
    pub max_anchors: usize,
    pub primary: DetectionParams,
    pub fallback: DetectionParams,
}

impl AnchorSearch {
    pub fn new(settings: &SceneSettings, start_frame: u32, end_frame: u32) -> Self {
        Self {
            start_frame,
            end_frame,
            max_anchors: settings.max_anchors,
            primary: DetectionParams {
                threshold: settings.threshold,
                min_scene_len: settings.min_scene_len,
            },
            fallback: DetectionParams {
                threshold: settings.fallback_threshold,
                min_scene_len: settings.fallback_min_scene_len,
            },
        }
    }

    pub fn with_max_anchors(mut self, max_anchors: usize) -> Self {
        self.max_anchors = max_anchors;
        self
    }
}

/// Find anchors in `video`, ascending, at most `search.max_anchors`.
///
/// A missing or failing detector yields an empty list; callers fall back
/// to cruder anchoring. Detection runs at most twice.
pub fn find_scene_anchors(
    detector: Option<&dyn SceneDetector>,
    video: &Path,
    search: &AnchorSearch,
) -> Vec<u32> {
    let Some(detector) = detector else {
        tracing::warn!("[SceneAnchors] No scene detector available, returning no anchors");
        return Vec::new();
    };

    let attempt = |params: DetectionParams| -> Option<Vec<u32>> {
        match detector.detect_scenes(video, search.start_frame, search.end_frame, params) {
            Ok(starts) => Some(anchors_from_scene_starts(&starts, search)),
            Err(e) => {
                tracing::warn!("[SceneAnchors] Detection failed on {}: {}", video.display(), e);
                None
            }
        }
    };

    let Some(anchors) = attempt(search.primary) else {
        return Vec::new();
    };
    if anchors.len() >= MIN_USEFUL_ANCHORS {
        tracing::info!(
            "[SceneAnchors] {} anchors in frames {}..={} (threshold {:.1})",
            anchors.len(),
            search.start_frame,
            search.end_frame,
            search.primary.threshold
        );
        return anchors;
    }

    tracing::info!(
        "[SceneAnchors] Only {} anchor(s) at threshold {:.1}, retrying at {:.1}",
        anchors.len(),
        search.primary.threshold,
        search.fallback.threshold
    );
    match attempt(search.fallback) {
        Some(retry) if retry.len() > anchors.len() => retry,
        _ => anchors,
    }
}

/// Turn scene start frames into anchors: drop the scene running at the
/// window edge, step back one frame from each cut, keep what lies inside
/// the window.
fn anchors_from_scene_starts(starts: &[u32], search: &AnchorSearch) -> Vec<u32> {
    let mut anchors: Vec<u32> = starts
        .iter()
        .skip(1)
        .filter(|&&start| start > 0)
        .map(|&start| start - 1)
        .filter(|&frame| frame >= search.start_frame && frame <= search.end_frame)
        .collect();
    anchors.sort_unstable();
    anchors.dedup();
    anchors.truncate(search.max_anchors);
    anchors
}

/// Times at which the scene following each anchor begins, for snapping.
pub fn cut_times_ms(anchors: &[u32], timebase: &Timebase) -> Vec<f64> {
    anchors
        .iter()
        .map(|&frame| timebase.frame_end_ms(frame))
        .collect()
}

/// Start times of the anchor frames themselves.
pub fn anchor_times_ms(anchors: &[u32], timebase: &Timebase) -> Vec<f64> {
    anchors
        .iter()
        .map(|&frame| timebase.frame_to_ms(frame, RoundingPolicy::Floor))
        .collect()
}
