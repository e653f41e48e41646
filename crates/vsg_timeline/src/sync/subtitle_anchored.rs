//! Subtitle-anchored frame-snap sync mode.
//!
//! Measures the delay where dialogue actually is: at subtitle event
//! starts, skipping the opening and ending. The checkpoints must agree on
//! one offset; their median is snapped to the nearest whole frame.

use super::sampling::subtitle_checkpoints;
use super::{
    collect_samples, snap_to_nearest_frame, SyncMode, SyncModeType, SyncRequest, SyncResult,
};
use crate::correction::{CorrectionResult, DelaySample};
use crate::error::{FailureCause, TimelineResult};

/// Fewer checkpoints than this give nothing to cross-check.
const MIN_CHECKPOINTS: usize = 2;

pub struct SubtitleAnchoredFrameSnap;

impl SubtitleAnchoredFrameSnap {
    fn insufficient(&self, usable: usize) -> SyncResult {
        let cause = FailureCause::InsufficientSamples {
            usable,
            required: MIN_CHECKPOINTS,
        };
        SyncResult::new(self.mode_type(), CorrectionResult::failed(cause))
    }
}

impl SyncMode for SubtitleAnchoredFrameSnap {
    fn mode_type(&self) -> SyncModeType {
        SyncModeType::SubtitleAnchoredFrameSnap
    }

    fn apply(&self, request: &SyncRequest<'_>) -> TimelineResult<SyncResult> {
        let strategy = &request.settings.strategy;
        let checkpoints_ms = subtitle_checkpoints(
            request.anchor_hints_ms,
            request.reference.duration_ms,
            strategy.subtitle_edge_exclusion_pct,
            strategy.subtitle_checkpoint_count,
        );

        if checkpoints_ms.len() < MIN_CHECKPOINTS {
            tracing::warn!(
                "[SubAnchored] Only {} usable subtitle checkpoint(s) out of {} events",
                checkpoints_ms.len(),
                request.anchor_hints_ms.len()
            );
            return Ok(self.insufficient(checkpoints_ms.len()));
        }

        let times: Vec<f64> = checkpoints_ms.iter().map(|t| t / 1000.0).collect();
        let min_confidence = request.settings.classifier.min_confidence;
        let usable: Vec<DelaySample> = collect_samples(request.sampler, &times)
            .into_iter()
            .filter(|s| s.is_finite() && s.confidence > 0.0 && s.confidence >= min_confidence)
            .collect();

        let mut result = if usable.len() < MIN_CHECKPOINTS {
            tracing::warn!(
                "[SubAnchored] Only {} of {} checkpoints measured",
                usable.len(),
                times.len()
            );
            self.insufficient(usable.len())
        } else {
            let offset = agreed_offset(&usable, strategy.frame_agreement_tolerance_ms);
            SyncResult::new(self.mode_type(), offset)
        };
        result.samples_requested = times.len();
        result.samples_used = usable.len();
        result.refresh_summary();

        let result = snap_to_nearest_frame(result, request)?;
        tracing::info!("[SubAnchored] {}", result.summary);
        Ok(result)
    }
}

/// Median checkpoint delay, or FAILED when the checkpoints spread wider
/// than `tolerance_ms`.
fn agreed_offset(samples: &[DelaySample], tolerance_ms: f64) -> CorrectionResult {
    let mut delays: Vec<f64> = samples.iter().map(|s| s.delay_ms).collect();
    delays.sort_by(f64::total_cmp);

    let spread = delays[delays.len() - 1] - delays[0];
    if spread > tolerance_ms {
        tracing::warn!(
            "[SubAnchored] Checkpoints disagree: spread {:.1}ms > {:.1}ms",
            spread,
            tolerance_ms
        );
        return CorrectionResult::failed(FailureCause::VerificationRejected {
            reason: format!("checkpoint delays spread {spread:.1}ms, tolerance {tolerance_ms:.1}ms"),
        });
    }

    let mid = delays.len() / 2;
    let median = if delays.len() % 2 == 0 {
        (delays[mid - 1] + delays[mid]) / 2.0
    } else {
        delays[mid]
    };
    tracing::debug!(
        "[SubAnchored] Median {:+.3}ms over {} checkpoints (spread {:.1}ms)",
        median,
        delays.len(),
        spread
    );
    CorrectionResult::uniform(median)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::Settings;
    use crate::correction::CorrectionVerdict;
    use crate::error::SampleError;
    use crate::sync::DelayMeasurement;
    use std::cell::RefCell;

    #[test]
    fn samples_at_selected_subtitle_events() {
        let reference = reference_track();
        let secondary = secondary_track();
        let settings = Settings::default();
        let seen = RefCell::new(Vec::new());
        let sampler = |t: f64| -> Result<DelayMeasurement, SampleError> {
            seen.borrow_mut().push(t);
            Ok(DelayMeasurement::new(500.0, 1.0))
        };
        let hints: Vec<f64> = (0..600).map(|i| i as f64 * 1000.0).collect();
        let request =
            SyncRequest::new(&reference, &secondary, &sampler, &settings).with_anchor_hints(&hints);

        let result = SubtitleAnchoredFrameSnap.apply(&request).unwrap();
        assert_eq!(result.correction.verdict(), CorrectionVerdict::Uniform);
        assert!(result.frame_snapped);
        assert_eq!(*seen.borrow(), vec![60.0, 300.0, 540.0]);
    }

    #[test]
    fn too_few_events_fail() {
        let reference = reference_track();
        let secondary = secondary_track();
        let settings = Settings::default();
        let sampler = constant_sampler(500.0);
        // Only one event outside the excluded edges.
        let hints = [1_000.0, 300_000.0, 599_000.0];
        let request =
            SyncRequest::new(&reference, &secondary, &sampler, &settings).with_anchor_hints(&hints);

        let result = SubtitleAnchoredFrameSnap.apply(&request).unwrap();
        assert_eq!(
            result.correction.failure(),
            Some(&FailureCause::InsufficientSamples {
                usable: 1,
                required: 2
            })
        );
    }

    #[test]
    fn two_checkpoints_are_enough() {
        let reference = reference_track();
        let secondary = secondary_track();
        let settings = Settings::default();
        let sampler = constant_sampler(500.0);
        let hints = [200_000.0, 400_000.0];
        let request =
            SyncRequest::new(&reference, &secondary, &sampler, &settings).with_anchor_hints(&hints);

        let result = SubtitleAnchoredFrameSnap.apply(&request).unwrap();
        assert_eq!(result.correction.verdict(), CorrectionVerdict::Uniform);
        assert_eq!(result.samples_used, 2);
        // 500ms is 11.99 frames at 23.976; nearest whole frame is 12.
        assert!((result.correction.offset().unwrap() - 500.5).abs() < 1e-9);
    }

    #[test]
    fn median_ignores_small_disagreement() {
        let reference = reference_track();
        let secondary = secondary_track();
        let settings = Settings::default();
        let sampler = |t: f64| -> Result<DelayMeasurement, SampleError> {
            let delay = if t < 100.0 { 480.0 } else if t < 400.0 { 500.5 } else { 540.0 };
            Ok(DelayMeasurement::new(delay, 1.0))
        };
        let hints = [60_000.0, 300_000.0, 540_000.0];
        let request =
            SyncRequest::new(&reference, &secondary, &sampler, &settings).with_anchor_hints(&hints);

        let result = SubtitleAnchoredFrameSnap.apply(&request).unwrap();
        assert!((result.correction.offset().unwrap() - 500.5).abs() < 1e-9);
    }

    #[test]
    fn disagreeing_checkpoints_fail() {
        let reference = reference_track();
        let secondary = secondary_track();
        let settings = Settings::default();
        let sampler = |t: f64| -> Result<DelayMeasurement, SampleError> {
            Ok(DelayMeasurement::new(if t < 300.0 { 0.0 } else { 1001.0 }, 1.0))
        };
        let hints = [100_000.0, 500_000.0];
        let request =
            SyncRequest::new(&reference, &secondary, &sampler, &settings).with_anchor_hints(&hints);

        let result = SubtitleAnchoredFrameSnap.apply(&request).unwrap();
        assert!(matches!(
            result.correction.failure(),
            Some(FailureCause::VerificationRejected { .. })
        ));
        assert!(!result.frame_snapped);
    }

    #[test]
    fn failed_measurements_count_against_checkpoints() {
        let reference = reference_track();
        let secondary = secondary_track();
        let settings = Settings::default();
        let sampler = |t: f64| -> Result<DelayMeasurement, SampleError> {
            if t < 300.0 {
                Ok(DelayMeasurement::new(500.0, 1.0))
            } else {
                Err(SampleError::new(t, "silence"))
            }
        };
        let hints = [100_000.0, 500_000.0];
        let request =
            SyncRequest::new(&reference, &secondary, &sampler, &settings).with_anchor_hints(&hints);

        let result = SubtitleAnchoredFrameSnap.apply(&request).unwrap();
        assert_eq!(
            result.correction.failure(),
            Some(&FailureCause::InsufficientSamples {
                usable: 1,
                required: 2
            })
        );
        assert_eq!(result.samples_requested, 2);
    }
}
