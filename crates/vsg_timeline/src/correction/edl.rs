//! Edit Decision List for stepped corrections.
//!
//! An EDL is an ordered run of [`AudioSegment`]s on the target timeline.
//! Segments must tile their range exactly: each segment ends where the
//! next begins. A broken tiling is an internal logic error and is
//! reported, never repaired.

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, TimelineResult};

/// Time region with a specific delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSegment {
    pub start_s: f64,
    pub end_s: f64,
    /// Rounded delay, for display and logs.
    pub delay_ms: i64,
    /// Full-precision delay at `start_s`; authoritative for retiming.
    pub delay_raw: f64,
    /// Linear drift on top of `delay_raw`, ms per second past `start_s`.
    pub drift_rate_ms_s: f64,
}

impl AudioSegment {
    pub fn new(start_s: f64, end_s: f64, delay_raw: f64) -> Self {
        Self::with_drift(start_s, end_s, delay_raw, 0.0)
    }

    pub fn with_drift(start_s: f64, end_s: f64, delay_raw: f64, drift_rate_ms_s: f64) -> Self {
        Self {
            start_s,
            end_s,
            delay_ms: delay_raw.round() as i64,
            delay_raw,
            drift_rate_ms_s,
        }
    }

    /// Delay in effect at `t_s`.
    pub fn delay_at(&self, t_s: f64) -> f64 {
        self.delay_raw + self.drift_rate_ms_s * (t_s - self.start_s)
    }

    pub fn duration_s(&self) -> f64 {
        self.end_s - self.start_s
    }

    /// Same segment with its delay replaced; drift is kept.
    pub fn with_delay(&self, delay_raw: f64) -> Self {
        Self::with_drift(self.start_s, self.end_s, delay_raw, self.drift_rate_ms_s)
    }
}

/// Validated, ordered, contiguous list of segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Edl {
    segments: Vec<AudioSegment>,
}

impl Edl {
    /// Build an EDL, rejecting anything that does not tile its range.
    pub fn new(segments: Vec<AudioSegment>) -> TimelineResult<Self> {
        validate_segments(&segments)?;
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[AudioSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment governing `t_s`: the last one starting at or before it.
    /// Times before the first segment use the first segment; times past
    /// the end extrapolate the last one.
    pub fn segment_at(&self, t_s: f64) -> Option<&AudioSegment> {
        let idx = self.segments.partition_point(|s| s.start_s <= t_s);
        self.segments.get(idx.saturating_sub(1))
    }

    /// Delay in effect at `t_s`.
    pub fn offset_at(&self, t_s: f64) -> Option<f64> {
        self.segment_at(t_s).map(|s| s.delay_at(t_s))
    }

    /// Apply `f` to every segment's `delay_raw`, keeping boundaries.
    pub fn map_delays(&self, f: impl Fn(f64) -> f64) -> TimelineResult<Self> {
        Self::new(self.segments.iter().map(|s| s.with_delay(f(s.delay_raw))).collect())
    }
}

fn validate_segments(segments: &[AudioSegment]) -> TimelineResult<()> {
    for (i, seg) in segments.iter().enumerate() {
        if !(seg.end_s > seg.start_s) {
            return Err(SyncError::InvalidSegmentInvariant {
                index: i,
                end_s: seg.end_s,
                next_start_s: seg.start_s,
            });
        }
    }
    for (i, pair) in segments.windows(2).enumerate() {
        if pair[0].end_s != pair[1].start_s {
            tracing::error!(
                "[EDL] Segment {} ends at {:.6}s, next starts at {:.6}s",
                i,
                pair[0].end_s,
                pair[1].start_s
            );
            return Err(SyncError::InvalidSegmentInvariant {
                index: i,
                end_s: pair[0].end_s,
                next_start_s: pair[1].start_s,
            });
        }
    }
    Ok(())
}
