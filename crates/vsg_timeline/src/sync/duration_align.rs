//! Duration-align sync mode.
//!
//! Assumes the two tracks end together: the delay is the reference
//! duration minus the secondary duration. With video timing both
//! durations are measured to the start of the last frame, which is what
//! an encode of the same content actually shares.
//!
//! Optionally cross-checked against a few correlation samples; a
//! disagreement either rejects the result or is logged and ignored,
//! depending on `duration_align_fallback`.

use super::sampling::chunk_times;
use super::{run_plan, SyncMode, SyncModeType, SyncRequest, SyncResult, TrackInfo};
use crate::config::SamplingSettings;
use crate::correction::CorrectionResult;
use crate::error::{FailureCause, TimelineResult};
use crate::models::{DurationAlignFallback, RoundingPolicy};

pub struct DurationAlign;

fn aligned_end_ms(track: &TrackInfo) -> f64 {
    match &track.timebase {
        Some(tb) => tb.frame_to_ms(tb.frame_count() - 1, RoundingPolicy::Floor),
        None => track.duration_ms,
    }
}

impl SyncMode for DurationAlign {
    fn mode_type(&self) -> SyncModeType {
        SyncModeType::DurationAlign
    }

    fn apply(&self, request: &SyncRequest<'_>) -> TimelineResult<SyncResult> {
        let offset = aligned_end_ms(request.reference) - aligned_end_ms(request.secondary);
        tracing::info!(
            "[DurationAlign] '{}' vs '{}': duration offset {:+.3}ms",
            request.reference.label,
            request.secondary.label,
            offset
        );

        let strategy = &request.settings.strategy;
        if !strategy.duration_align_verify {
            return Ok(SyncResult::new(self.mode_type(), CorrectionResult::uniform(offset)));
        }

        // Small plan: just enough samples for a verdict.
        let sampling = SamplingSettings {
            chunk_count: request.settings.classifier.min_samples,
            ..request.settings.sampling.clone()
        };
        let times = chunk_times(request.reference.duration_ms / 1000.0, &sampling);
        let check = run_plan(self.mode_type(), request, &times)?;

        let disagreement = match check.correction.offset() {
            Some(measured) if (measured - offset).abs() <= strategy.frame_agreement_tolerance_ms => {
                None
            }
            Some(measured) => Some(format!(
                "correlation {measured:+.1}ms disagrees with duration {offset:+.1}ms by more than {:.1}ms",
                strategy.frame_agreement_tolerance_ms
            )),
            None => Some(format!(
                "correlation check was not uniform: {}",
                check.correction.summary()
            )),
        };

        let correction = match disagreement {
            None => {
                tracing::debug!("[DurationAlign] Correlation check agrees");
                CorrectionResult::uniform(offset)
            }
            Some(reason) => match strategy.duration_align_fallback {
                DurationAlignFallback::Abort => {
                    tracing::warn!("[DurationAlign] Rejected: {}", reason);
                    CorrectionResult::failed(FailureCause::VerificationRejected { reason })
                }
                DurationAlignFallback::UseDuration => {
                    tracing::warn!("[DurationAlign] {}; keeping duration offset", reason);
                    CorrectionResult::uniform(offset)
                }
            },
        };

        let mut result = SyncResult::new(self.mode_type(), correction);
        result.samples_requested = check.samples_requested;
        result.samples_used = check.samples_used;
        result.refresh_summary();
        Ok(result)
    }
}
