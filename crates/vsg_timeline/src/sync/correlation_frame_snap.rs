//! Correlation frame-snap sync mode.
//!
//! Standard chunk plan, classified, then every delay rounded to the
//! nearest whole reference frame.

use super::sampling::chunk_times;
use super::{run_plan, snap_to_nearest_frame, SyncMode, SyncModeType, SyncRequest, SyncResult};
use crate::error::TimelineResult;

pub struct CorrelationFrameSnap;

impl CorrelationFrameSnap {
    /// Shared with video-verified mode, which reports under its own name.
    pub(super) fn run(mode: SyncModeType, request: &SyncRequest<'_>) -> TimelineResult<SyncResult> {
        let times = chunk_times(
            request.reference.duration_ms / 1000.0,
            &request.settings.sampling,
        );
        let result = run_plan(mode, request, &times)?;
        snap_to_nearest_frame(result, request)
    }
}

impl SyncMode for CorrelationFrameSnap {
    fn mode_type(&self) -> SyncModeType {
        SyncModeType::CorrelationFrameSnap
    }

    fn apply(&self, request: &SyncRequest<'_>) -> TimelineResult<SyncResult> {
        let result = Self::run(self.mode_type(), request)?;
        tracing::info!("[FrameSnap] {}", result.summary);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::Settings;
    use crate::error::SampleError;
    use crate::sync::DelayMeasurement;

    #[test]
    fn uniform_delay_snaps_to_nearest_frame() {
        let reference = reference_track();
        let secondary = secondary_track();
        let settings = Settings::default();
        // 1030ms is 24.7 frames at 23.976 -> 25 frames.
        let sampler = constant_sampler(1030.0);
        let request = SyncRequest::new(&reference, &secondary, &sampler, &settings);

        let result = CorrelationFrameSnap.apply(&request).unwrap();
        assert!(result.frame_snapped);
        assert!((result.correction.offset().unwrap() - 1042.708_333).abs() < 1e-3);
    }

    #[test]
    fn stepped_segments_snap_independently() {
        let reference = reference_track();
        let secondary = secondary_track();
        let settings = Settings::default();
        let sampler = |t: f64| -> Result<DelayMeasurement, SampleError> {
            Ok(DelayMeasurement::new(if t < 300.0 { 10.0 } else { 1010.0 }, 1.0))
        };
        let request = SyncRequest::new(&reference, &secondary, &sampler, &settings);

        let result = CorrelationFrameSnap.apply(&request).unwrap();
        let edl = result.correction.edl().unwrap();
        assert_eq!(edl.segments()[0].delay_raw, 0.0);
        assert!((edl.segments()[1].delay_raw - 1001.0).abs() < 1e-6);
    }

    #[test]
    fn failed_verdict_is_not_snapped() {
        let reference = reference_track();
        let secondary = secondary_track();
        let settings = Settings::default();
        let sampler = |t: f64| -> Result<DelayMeasurement, SampleError> {
            Ok(DelayMeasurement::new(t * 3.7 % 400.0, 1.0))
        };
        let request = SyncRequest::new(&reference, &secondary, &sampler, &settings);

        let result = CorrelationFrameSnap.apply(&request).unwrap();
        assert!(result.correction.is_failed());
        assert!(!result.frame_snapped);
    }
}
