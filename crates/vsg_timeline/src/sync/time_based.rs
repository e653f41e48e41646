//! Time-based sync mode.
//!
//! Samples the standard chunk plan and applies the classified correction
//! exactly as measured. No frame quantization.

use super::sampling::chunk_times;
use super::{run_plan, SyncMode, SyncModeType, SyncRequest, SyncResult};
use crate::error::TimelineResult;

pub struct TimeBased;

impl SyncMode for TimeBased {
    fn mode_type(&self) -> SyncModeType {
        SyncModeType::TimeBased
    }

    fn apply(&self, request: &SyncRequest<'_>) -> TimelineResult<SyncResult> {
        let times = chunk_times(
            request.reference.duration_ms / 1000.0,
            &request.settings.sampling,
        );
        let result = run_plan(self.mode_type(), request, &times)?;
        tracing::info!("[TimeBased] {}", result.summary);
        Ok(result)
    }
}
