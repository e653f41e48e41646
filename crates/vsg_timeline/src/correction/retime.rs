//! Apply a correction to event timings.
//!
//! Offsets come from `delay_raw` (never the rounded `delay_ms`) so that
//! rounding error does not compound across segments. With a `Timebase`,
//! the shifted times are then quantized to frames under the caller's
//! rounding policy.

use serde::{Deserialize, Serialize};

use super::types::CorrectionResult;
use crate::frame_utils::Timebase;
use crate::models::RoundingPolicy;

/// A timed event, e.g. one subtitle line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start_ms: f64,
    pub end_ms: f64,
}

impl TimeSpan {
    pub fn new(start_ms: f64, end_ms: f64) -> Self {
        Self { start_ms, end_ms }
    }
}

/// Frame quantization applied after shifting.
#[derive(Debug, Clone, Copy)]
pub struct FrameSnap<'a> {
    pub timebase: &'a Timebase,
    pub policy: RoundingPolicy,
}

/// Shift one time. `None` when the correction is FAILED.
///
/// The offset is looked up at the time's original position.
pub fn retime_ms(time_ms: f64, correction: &CorrectionResult) -> Option<f64> {
    let offset = correction.offset_at(time_ms / 1000.0)?;
    Some((time_ms + offset).max(0.0))
}

fn quantize(time_ms: f64, snap: &FrameSnap<'_>) -> (f64, u32) {
    let frame = snap.timebase.ms_to_frame(time_ms, snap.policy);
    (snap.timebase.frame_to_ms(frame, snap.policy), frame)
}

/// Shift every span, returning a new list. `None` when the correction is
/// FAILED: nothing is applied rather than guessing.
///
/// Each span keeps a positive duration; if frame snapping collapses it,
/// the end moves to the next frame.
pub fn retime_spans(
    spans: &[TimeSpan],
    correction: &CorrectionResult,
    snap: Option<FrameSnap<'_>>,
) -> Option<Vec<TimeSpan>> {
    if correction.is_failed() {
        return None;
    }

    let retimed = spans
        .iter()
        .map(|span| {
            let start = retime_ms(span.start_ms, correction).unwrap_or(span.start_ms);
            let end = retime_ms(span.end_ms, correction).unwrap_or(span.end_ms);
            match &snap {
                Some(snap) => {
                    let (start, start_frame) = quantize(start, snap);
                    let (mut end, _) = quantize(end, snap);
                    if end <= start {
                        let next = start_frame + 1;
                        end = if next < snap.timebase.frame_count() {
                            snap.timebase.frame_to_ms(next, snap.policy)
                        } else {
                            snap.timebase.frame_end_ms(start_frame)
                        };
                    }
                    TimeSpan::new(start, end)
                }
                None => TimeSpan::new(start, end.max(start)),
            }
        })
        .collect();

    Some(retimed)
}
