//! Chapter and anchor types.

use serde::{Deserialize, Serialize};

use crate::frame_utils::Timebase;
use crate::scene::cut_times_ms;

/// One chapter. Times are milliseconds on the output timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub start_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<f64>,
    #[serde(default)]
    pub title: String,
}

impl Chapter {
    pub fn new(start_ms: f64, title: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms: None,
            title: title.into(),
        }
    }

    pub fn with_end(mut self, end_ms: f64) -> Self {
        self.end_ms = Some(end_ms);
        self
    }
}

/// Sorted, deduplicated anchor times (ms) chapters may snap to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorSet {
    times_ms: Vec<f64>,
}

impl AnchorSet {
    pub fn new(times_ms: impl IntoIterator<Item = f64>) -> Self {
        let mut times_ms: Vec<f64> = times_ms.into_iter().filter(|t| t.is_finite()).collect();
        times_ms.sort_by(f64::total_cmp);
        times_ms.dedup();
        Self { times_ms }
    }

    /// Cut times for scene anchors (the start of the frame after each anchor).
    pub fn from_scene_anchors(anchors: &[u32], timebase: &Timebase) -> Self {
        Self::new(cut_times_ms(anchors, timebase))
    }

    pub fn times_ms(&self) -> &[f64] {
        &self.times_ms
    }

    pub fn len(&self) -> usize {
        self.times_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times_ms.is_empty()
    }

    /// Last anchor at or before `time_ms`.
    pub fn previous(&self, time_ms: f64) -> Option<f64> {
        let idx = self.times_ms.partition_point(|&t| t <= time_ms);
        idx.checked_sub(1).map(|i| self.times_ms[i])
    }

    /// First anchor at or after `time_ms`.
    pub fn next(&self, time_ms: f64) -> Option<f64> {
        let idx = self.times_ms.partition_point(|&t| t < time_ms);
        self.times_ms.get(idx).copied()
    }

    /// Closest anchor; an exact tie goes to the earlier one.
    pub fn nearest(&self, time_ms: f64) -> Option<f64> {
        match (self.previous(time_ms), self.next(time_ms)) {
            (Some(before), Some(after)) => {
                if time_ms - before <= after - time_ms {
                    Some(before)
                } else {
                    Some(after)
                }
            }
            (before, after) => before.or(after),
        }
    }
}

/// Format milliseconds as `HH:MM:SS.mmm` for logs.
pub fn format_timestamp_ms(ms: f64) -> String {
    let total_ms = ms.max(0.0).round() as u64;
    let millis = total_ms % 1000;
    let total_secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60,
        millis
    )
}
