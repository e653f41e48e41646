//! Timebase frame-locked sync mode.
//!
//! Classifies the standard chunk plan, then aligns the offset (or each
//! segment delay) to a reference frame start under the job's rounding
//! policy. Subtitles shifted by the result land exactly on frame starts.

use super::sampling::chunk_times;
use super::{align_correction, run_plan, SyncMode, SyncModeType, SyncRequest, SyncResult};
use crate::error::TimelineResult;

pub struct TimebaseFrameLocked;

impl SyncMode for TimebaseFrameLocked {
    fn mode_type(&self) -> SyncModeType {
        SyncModeType::TimebaseFrameLocked
    }

    fn apply(&self, request: &SyncRequest<'_>) -> TimelineResult<SyncResult> {
        let times = chunk_times(
            request.reference.duration_ms / 1000.0,
            &request.settings.sampling,
        );
        let mut result = run_plan(self.mode_type(), request, &times)?;
        if result.correction.is_failed() {
            tracing::warn!("[FrameLocked] {}", result.summary);
            return Ok(result);
        }

        let Some(timebase) = request.snap_timebase() else {
            tracing::warn!(
                "[FrameLocked] No timebase for '{}', delay left unlocked",
                request.reference.label
            );
            return Ok(result);
        };

        let policy = request.settings.timing.rounding;
        result.correction = align_correction(&result.correction, |d| timebase.align_offset(d, policy))?;
        result.frame_snapped = true;
        result.refresh_summary();
        tracing::info!("[FrameLocked] {} ({:?} rounding)", result.summary, policy);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::Settings;
    use crate::models::RoundingPolicy;
    use crate::sync::TrackInfo;

    #[test]
    fn floor_locks_to_frame_start() {
        let reference = reference_track();
        let secondary = secondary_track();
        let settings = Settings::default();
        // 1020ms at 23.976 is 24.46 frames; floor keeps 24 frames = 1001ms.
        let sampler = constant_sampler(1020.0);
        let request = SyncRequest::new(&reference, &secondary, &sampler, &settings);

        let result = TimebaseFrameLocked.apply(&request).unwrap();
        assert!(result.frame_snapped);
        assert!((result.correction.offset().unwrap() - 1001.0).abs() < 1e-6);
    }

    #[test]
    fn negative_delay_keeps_sign() {
        let reference = reference_track();
        let secondary = secondary_track();
        let mut settings = Settings::default();
        settings.timing.rounding = RoundingPolicy::Middle;
        let sampler = constant_sampler(-1030.0);
        let request = SyncRequest::new(&reference, &secondary, &sampler, &settings);

        let result = TimebaseFrameLocked.apply(&request).unwrap();
        assert!((result.correction.offset().unwrap() + 1042.708_333).abs() < 1e-3);
    }

    #[test]
    fn without_timebase_result_is_unlocked() {
        let reference = TrackInfo::new("audio-only", 600_000.0);
        let secondary = secondary_track();
        let settings = Settings::default();
        let sampler = constant_sampler(1020.0);
        let request = SyncRequest::new(&reference, &secondary, &sampler, &settings);

        let result = TimebaseFrameLocked.apply(&request).unwrap();
        assert!(!result.frame_snapped);
        assert_eq!(result.correction.offset(), Some(1020.0));
    }
}
