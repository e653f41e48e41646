//! Correlation-guided frame-anchor sync mode.
//!
//! Instead of spreading samples thinly, measures dense windows around a
//! few fixed anchor positions. Agreement inside a window makes each
//! anchor's delay trustworthy; disagreement between anchors becomes a
//! stepped EDL. Delays are snapped to the nearest whole frame.

use super::sampling::anchor_window_times;
use super::{run_plan, snap_to_nearest_frame, SyncMode, SyncModeType, SyncRequest, SyncResult};
use crate::error::TimelineResult;

pub struct CorrelationGuidedFrameAnchor;

impl SyncMode for CorrelationGuidedFrameAnchor {
    fn mode_type(&self) -> SyncModeType {
        SyncModeType::CorrelationGuidedFrameAnchor
    }

    fn apply(&self, request: &SyncRequest<'_>) -> TimelineResult<SyncResult> {
        let times = anchor_window_times(
            request.reference.duration_ms / 1000.0,
            &request.settings.strategy,
        );
        let result = run_plan(self.mode_type(), request, &times)?;
        let result = snap_to_nearest_frame(result, request)?;
        tracing::info!("[GuidedAnchor] {}", result.summary);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::Settings;
    use crate::correction::CorrectionVerdict;
    use crate::error::SampleError;
    use crate::sync::DelayMeasurement;

    #[test]
    fn samples_dense_windows() {
        let reference = reference_track();
        let secondary = secondary_track();
        let settings = Settings::default();
        let sampler = constant_sampler(-250.0);
        let request = SyncRequest::new(&reference, &secondary, &sampler, &settings);

        let result = CorrelationGuidedFrameAnchor.apply(&request).unwrap();
        assert_eq!(result.samples_requested, 9);
        assert_eq!(result.correction.verdict(), CorrectionVerdict::Uniform);
        assert!(result.frame_snapped);
    }

    #[test]
    fn anchor_disagreement_is_stepped() {
        let reference = reference_track();
        let secondary = secondary_track();
        let settings = Settings::default();
        // Anchors at 60s, 300s, 540s; an edit between the last two.
        let sampler = |t: f64| -> Result<DelayMeasurement, SampleError> {
            Ok(DelayMeasurement::new(if t < 400.0 { 0.0 } else { -2002.0 }, 1.0))
        };
        let request = SyncRequest::new(&reference, &secondary, &sampler, &settings);

        let result = CorrelationGuidedFrameAnchor.apply(&request).unwrap();
        let edl = result.correction.edl().unwrap();
        assert_eq!(edl.len(), 2);
        assert!((edl.segments()[1].start_s - 420.0).abs() < 1e-9);
        assert_eq!(edl.segments()[1].delay_ms, -2002);
    }
}
