//! Video-verified sync mode.
//!
//! Runs the correlation frame-snap core, then checks the result against
//! the pictures themselves.
//!
//! # Algorithm
//!
//! 1. Classify the standard chunk plan and snap to whole frames
//! 2. Find scene-cut anchors in the reference video
//! 3. For each anchor, predict the matching secondary frame from the delay
//! 4. Search `search_range_frames` either side for the frame pair that
//!    straddles the same cut (perceptual hash match on both frames)
//! 5. Reject the correction if too few anchors match; if the matches agree
//!    on a non-zero frame shift, correct the delay by that shift
//!
//! Comparing the pair on both sides of a cut pins the match to one frame:
//! frames inside a scene all look alike, the cut is the only place where
//! adjacent frames differ.
//!
//! # Downgrade
//!
//! Without video access, video paths, timebases or usable anchors the
//! mode cannot verify anything. It then reports the plain frame-snap
//! result with `downgraded_from` set. The decision is made once per
//! invocation and never revisited.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::path::Path;

use image_hasher::ImageHash;
use serde::Serialize;

use super::correlation_frame_snap::CorrelationFrameSnap;
use super::{align_correction, SyncMode, SyncModeType, SyncRequest, SyncResult, VideoAccess};
use crate::config::VerificationSettings;
use crate::correction::CorrectionResult;
use crate::error::{FailureCause, SyncError, TimelineResult};
use crate::frame_utils::hash::{compute_hash, hash_distance};
use crate::frame_utils::timing::frame_search_offsets;
use crate::frame_utils::{Timebase, VideoReader};
use crate::models::RoundingPolicy;
use crate::scene::{find_scene_anchors, AnchorSearch};

/// Scene-cut cross-check details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorVerification {
    /// Reference anchor frames (last frame before each cut).
    pub anchors: Vec<u32>,
    /// Anchors that could be compared at all.
    pub anchors_checked: usize,
    pub anchors_matched: usize,
    /// Agreed secondary frame shift relative to the correlation delay.
    pub frame_shift: i64,
    /// Delay adjustment applied for `frame_shift`.
    pub correction_ms: f64,
}

/// Video-verified sync mode.
pub struct VideoVerified;

struct VerifyInputs<'r> {
    access: VideoAccess<'r>,
    reference_path: &'r Path,
    secondary_path: &'r Path,
    reference_tb: &'r Timebase,
    secondary_tb: &'r Timebase,
}

impl<'r> VerifyInputs<'r> {
    fn from_request(request: &SyncRequest<'r>) -> Result<Self, &'static str> {
        Ok(Self {
            access: request.video.ok_or("no video access")?,
            reference_path: request
                .reference
                .video_path
                .as_deref()
                .ok_or("reference has no video")?,
            secondary_path: request
                .secondary
                .video_path
                .as_deref()
                .ok_or("secondary has no video")?,
            reference_tb: request
                .reference
                .timebase
                .as_ref()
                .ok_or("reference has no timebase")?,
            secondary_tb: request
                .secondary
                .timebase
                .as_ref()
                .ok_or("secondary has no timebase")?,
        })
    }
}

enum AnchorOutcome {
    /// Frames could not be read or the prediction fell outside the video.
    Skipped,
    Unmatched,
    Matched(i64),
}

fn downgrade(mut result: SyncResult, reason: impl Display) -> SyncResult {
    tracing::warn!(
        "[VideoVerified] {}; downgrading to {}",
        reason,
        SyncModeType::CorrelationFrameSnap
    );
    result.mode = SyncModeType::CorrelationFrameSnap;
    result.downgraded_from = Some(SyncModeType::VideoVerified);
    result.refresh_summary();
    result
}

/// Hashes of frames `frame` and `frame + 1`.
fn pair_hashes(
    reader: &dyn VideoReader,
    frame: u32,
    hash_size: u8,
) -> Option<(ImageHash, ImageHash)> {
    let read = |index: u32| match reader.get_frame(index) {
        Ok(image) => Some(compute_hash(&image, hash_size)),
        Err(e) => {
            tracing::debug!("[VideoVerified] {}", e);
            None
        }
    };
    Some((read(frame)?, read(frame + 1)?))
}

struct Matcher<'a> {
    reference: &'a dyn VideoReader,
    secondary: &'a dyn VideoReader,
    settings: &'a VerificationSettings,
    secondary_hashes: HashMap<u32, Option<ImageHash>>,
}

impl Matcher<'_> {
    fn secondary_hash(&mut self, frame: u32) -> Option<ImageHash> {
        let reader = self.secondary;
        let hash_size = self.settings.hash_size;
        self.secondary_hashes
            .entry(frame)
            .or_insert_with(|| match reader.get_frame(frame) {
                Ok(image) => Some(compute_hash(&image, hash_size)),
                Err(e) => {
                    tracing::debug!("[VideoVerified] {}", e);
                    None
                }
            })
            .clone()
    }

    fn check(&mut self, anchor: u32, predicted: i64) -> AnchorOutcome {
        let Some((ref_before, ref_after)) =
            pair_hashes(self.reference, anchor, self.settings.hash_size)
        else {
            return AnchorOutcome::Skipped;
        };

        let frame_count = self.secondary.frame_count() as i64;
        let mut compared = false;
        for delta in frame_search_offsets(self.settings.search_range_frames) {
            let candidate = predicted + delta;
            if candidate < 0 || candidate + 1 >= frame_count {
                continue;
            }
            let candidate = candidate as u32;
            let (Some(before), Some(after)) = (
                self.secondary_hash(candidate),
                self.secondary_hash(candidate + 1),
            ) else {
                continue;
            };
            compared = true;

            let threshold = self.settings.hash_threshold;
            if hash_distance(&ref_before, &before) <= threshold
                && hash_distance(&ref_after, &after) <= threshold
            {
                return AnchorOutcome::Matched(delta);
            }
        }

        if compared {
            AnchorOutcome::Unmatched
        } else {
            AnchorOutcome::Skipped
        }
    }
}

/// Most common shift; ties go to the smaller magnitude, then the earlier frame.
fn agreed_shift(shifts: &[i64]) -> i64 {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for &shift in shifts {
        *counts.entry(shift).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(sa, ca), (sb, cb)| {
            ca.cmp(cb)
                .then(sb.abs().cmp(&sa.abs()))
                .then(sb.cmp(sa))
        })
        .map(|(shift, _)| shift)
        .unwrap_or(0)
}

impl SyncMode for VideoVerified {
    fn mode_type(&self) -> SyncModeType {
        SyncModeType::VideoVerified
    }

    fn apply(&self, request: &SyncRequest<'_>) -> TimelineResult<SyncResult> {
        let inputs = match VerifyInputs::from_request(request) {
            Ok(inputs) => inputs,
            Err(reason) => {
                let result = CorrelationFrameSnap::run(SyncModeType::CorrelationFrameSnap, request)?;
                return Ok(downgrade(result, reason));
            }
        };

        let mut result = CorrelationFrameSnap::run(self.mode_type(), request)?;
        if result.correction.is_failed() {
            tracing::warn!("[VideoVerified] {}", result.summary);
            return Ok(result);
        }

        let verification = &request.settings.verification;
        let last_pair_start = inputs.reference_tb.frame_count().saturating_sub(2);
        let search = AnchorSearch::new(&request.settings.scene, 0, last_pair_start)
            .with_max_anchors(verification.num_checkpoints);
        let anchors =
            find_scene_anchors(Some(inputs.access.detector), inputs.reference_path, &search);
        if anchors.is_empty() {
            let err = SyncError::anchor_unavailable(format!(
                "no scene cuts in {}",
                inputs.reference_path.display()
            ));
            return Ok(downgrade(result, err));
        }

        let readers = inputs
            .access
            .decoder
            .open(inputs.reference_path)
            .and_then(|r| Ok((r, inputs.access.decoder.open(inputs.secondary_path)?)));
        let (reference_reader, secondary_reader) = match readers {
            Ok(readers) => readers,
            Err(e) => return Ok(downgrade(result, e)),
        };

        let mut matcher = Matcher {
            reference: reference_reader.as_ref(),
            secondary: secondary_reader.as_ref(),
            settings: verification,
            secondary_hashes: HashMap::new(),
        };

        let mut checked = 0usize;
        let mut shifts = Vec::new();
        for &anchor in &anchors {
            let ref_ms = inputs.reference_tb.frame_to_ms(anchor, RoundingPolicy::Floor);
            let Some(delay) = result.correction.offset_at(ref_ms / 1000.0) else {
                continue;
            };
            let secondary_ms = ref_ms - delay;
            if secondary_ms < 0.0 {
                continue;
            }
            let half_frame = inputs.secondary_tb.frame_duration_ms() / 2.0;
            let predicted = inputs
                .secondary_tb
                .ms_to_frame(secondary_ms + half_frame, RoundingPolicy::Floor)
                as i64;

            match matcher.check(anchor, predicted) {
                AnchorOutcome::Skipped => {}
                AnchorOutcome::Unmatched => {
                    checked += 1;
                    tracing::debug!("[VideoVerified] Anchor {} unmatched", anchor);
                }
                AnchorOutcome::Matched(delta) => {
                    checked += 1;
                    tracing::debug!("[VideoVerified] Anchor {} matched at {:+} frames", anchor, delta);
                    shifts.push(delta);
                }
            }
        }
        drop(matcher);
        drop(secondary_reader);
        drop(reference_reader);

        if checked == 0 {
            return Ok(downgrade(result, "no anchor could be compared"));
        }

        let matched = shifts.len();
        let frame_shift = agreed_shift(&shifts);
        let correction_ms = -(frame_shift as f64) * inputs.secondary_tb.frame_duration_ms();
        let mut report = AnchorVerification {
            anchors,
            anchors_checked: checked,
            anchors_matched: matched,
            frame_shift,
            correction_ms: 0.0,
        };

        let fraction = matched as f64 / checked as f64;
        if fraction < verification.min_match_fraction {
            let reason = format!(
                "{matched}/{checked} scene anchors matched, {:.0}% required",
                verification.min_match_fraction * 100.0
            );
            tracing::warn!("[VideoVerified] Rejected: {}", reason);
            result.correction = CorrectionResult::failed(FailureCause::VerificationRejected { reason });
        } else if frame_shift != 0 {
            tracing::info!(
                "[VideoVerified] Anchors agree on {:+} frame(s), adjusting delay by {:+.3}ms",
                frame_shift,
                correction_ms
            );
            let reference_tb = inputs.reference_tb;
            result.correction = align_correction(&result.correction, |d| {
                reference_tb.snap_offset_nearest(d + correction_ms)
            })?;
            report.correction_ms = correction_ms;
        }

        result.verification = Some(report);
        result.refresh_summary();
        tracing::info!("[VideoVerified] {}", result.summary);
        Ok(result)
    }
}
