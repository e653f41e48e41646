//! Clamped frame/time converter for one video.
//!
//! `Timebase` answers "which frame is on screen at time t" and "when does
//! frame n start" for either a constant frame rate or a per-frame
//! timestamp table (VFR). Out-of-range inputs clamp to the first or last
//! frame instead of erroring: callers routinely pass estimated times that
//! overshoot by a frame or two.

use serde::{Deserialize, Serialize};

use super::timing::{self, ceil_to_centisecond, exact_fps, frame_duration_ms};
use crate::error::FrameError;
use crate::models::RoundingPolicy;

const EPSILON: f64 = 1e-6;

/// Frame timing for a single video.
///
/// Only built through [`Timebase::cfr`] and [`Timebase::vfr`]; deserializing
/// runs the same checks, so every value has at least one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Frames", into = "Frames")]
pub struct Timebase(Frames);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
enum Frames {
    /// Constant frame rate.
    Cfr { fps: f64, frame_count: u32 },
    /// Variable frame rate: start time of every frame, strictly increasing.
    Vfr { timestamps_ms: Vec<f64> },
}

impl TryFrom<Frames> for Timebase {
    type Error = FrameError;

    fn try_from(frames: Frames) -> Result<Self, Self::Error> {
        match frames {
            Frames::Cfr { fps, frame_count } => Self::cfr(fps, frame_count),
            Frames::Vfr { timestamps_ms } => Self::vfr(timestamps_ms),
        }
    }
}

impl From<Timebase> for Frames {
    fn from(timebase: Timebase) -> Self {
        timebase.0
    }
}

impl Timebase {
    pub fn cfr(fps: f64, frame_count: u32) -> Result<Self, FrameError> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(FrameError::InvalidData(format!("invalid fps {fps}")));
        }
        if frame_count == 0 {
            return Err(FrameError::InvalidData("video has no frames".to_string()));
        }
        Ok(Self(Frames::Cfr {
            fps: exact_fps(fps),
            frame_count,
        }))
    }

    pub fn vfr(timestamps_ms: Vec<f64>) -> Result<Self, FrameError> {
        if timestamps_ms.len() < 2 {
            return Err(FrameError::InvalidData(format!(
                "VFR table needs at least 2 timestamps, got {}",
                timestamps_ms.len()
            )));
        }
        if timestamps_ms.iter().any(|t| !t.is_finite()) {
            return Err(FrameError::InvalidData(
                "VFR table contains non-finite timestamps".to_string(),
            ));
        }
        if let Some(pos) = timestamps_ms.windows(2).position(|w| w[1] <= w[0]) {
            return Err(FrameError::InvalidData(format!(
                "VFR table not strictly increasing at frame {}",
                pos + 1
            )));
        }
        Ok(Self(Frames::Vfr { timestamps_ms }))
    }

    pub fn is_vfr(&self) -> bool {
        matches!(self.0, Frames::Vfr { .. })
    }

    pub fn frame_count(&self) -> u32 {
        match &self.0 {
            Frames::Cfr { frame_count, .. } => *frame_count,
            Frames::Vfr { timestamps_ms } => timestamps_ms.len() as u32,
        }
    }

    /// Frame rate; the average rate for VFR.
    pub fn fps(&self) -> f64 {
        1000.0 / self.frame_duration_ms()
    }

    /// Frame duration; the average duration for VFR.
    pub fn frame_duration_ms(&self) -> f64 {
        match &self.0 {
            Frames::Cfr { fps, .. } => frame_duration_ms(*fps),
            Frames::Vfr { timestamps_ms: ts } => {
                (ts[ts.len() - 1] - ts[0]) / (ts.len() - 1) as f64
            }
        }
    }

    /// Time at which the last frame stops displaying.
    pub fn duration_ms(&self) -> f64 {
        match &self.0 {
            Frames::Cfr { fps, frame_count } => *frame_count as f64 * frame_duration_ms(*fps),
            Frames::Vfr { timestamps_ms: ts } => ts[ts.len() - 1] + self.last_frame_duration(),
        }
    }

    fn last_frame_duration(&self) -> f64 {
        match &self.0 {
            Frames::Cfr { fps, .. } => frame_duration_ms(*fps),
            Frames::Vfr { timestamps_ms: ts } => ts[ts.len() - 1] - ts[ts.len() - 2],
        }
    }

    fn last_frame(&self) -> u32 {
        self.frame_count().saturating_sub(1)
    }

    /// Frame displayed at `time_ms`, clamped to `[0, frame_count)`.
    pub fn ms_to_frame(&self, time_ms: f64, policy: RoundingPolicy) -> u32 {
        match &self.0 {
            Frames::Cfr { fps, .. } => {
                let frame = timing::time_to_frame(time_ms, *fps, policy);
                frame.clamp(0, self.last_frame() as i64) as u32
            }
            Frames::Vfr { timestamps_ms: ts } => {
                // Every policy maps back inside its own frame window, so a
                // floor search on frame starts recovers the frame for all three.
                let idx = ts.partition_point(|&t| t <= time_ms + EPSILON);
                idx.saturating_sub(1) as u32
            }
        }
    }

    /// Time representing `frame` under `policy`; the frame is clamped first.
    pub fn frame_to_ms(&self, frame: u32, policy: RoundingPolicy) -> f64 {
        let frame = frame.min(self.last_frame());
        match &self.0 {
            Frames::Cfr { fps, .. } => timing::frame_to_time(frame as i64, *fps, policy),
            Frames::Vfr { timestamps_ms: ts } => {
                let start = ts[frame as usize];
                match policy {
                    RoundingPolicy::Floor => start,
                    RoundingPolicy::Middle => ((start + self.frame_end_ms(frame)) / 2.0).round(),
                    RoundingPolicy::Aegisub => ceil_to_centisecond(start),
                }
            }
        }
    }

    /// Time at which `frame` stops displaying (start of the next frame).
    pub fn frame_end_ms(&self, frame: u32) -> f64 {
        let frame = frame.min(self.last_frame());
        match &self.0 {
            Frames::Cfr { fps, .. } => (frame as f64 + 1.0) * frame_duration_ms(*fps),
            Frames::Vfr { timestamps_ms: ts } => match ts.get(frame as usize + 1) {
                Some(&next) => next,
                None => ts[frame as usize] + self.last_frame_duration(),
            },
        }
    }

    /// Align a delay (not a position) to a whole number of frames.
    ///
    /// The sign is kept and the magnitude is aligned: `Floor` truncates to a
    /// frame start, `Middle` picks the nearest frame start, and `Aegisub`
    /// truncates and then rounds up to a centisecond. Offsets are not clamped.
    pub fn align_offset(&self, offset_ms: f64, policy: RoundingPolicy) -> f64 {
        let magnitude = offset_ms.abs();
        let aligned = match policy {
            RoundingPolicy::Floor => self.align_magnitude(magnitude, false),
            RoundingPolicy::Middle => self.align_magnitude(magnitude, true),
            RoundingPolicy::Aegisub => ceil_to_centisecond(self.align_magnitude(magnitude, false)),
        };
        if offset_ms < 0.0 {
            -aligned
        } else {
            aligned
        }
    }

    /// Round a delay to the nearest whole frame.
    pub fn snap_offset_nearest(&self, offset_ms: f64) -> f64 {
        self.align_offset(offset_ms, RoundingPolicy::Middle)
    }

    fn align_magnitude(&self, magnitude: f64, nearest: bool) -> f64 {
        let whole_frames = |span: f64, dur: f64| {
            if nearest {
                (span / dur).round()
            } else {
                ((span + EPSILON) / dur).floor()
            }
        };

        match &self.0 {
            Frames::Cfr { fps, .. } => {
                let dur = frame_duration_ms(*fps);
                whole_frames(magnitude, dur) * dur
            }
            Frames::Vfr { timestamps_ms: ts } => {
                // Measure the offset against the table from its first frame.
                let origin = ts[0];
                let target = origin + magnitude;
                let last = ts[ts.len() - 1];
                if target >= last {
                    let dur = self.frame_duration_ms();
                    return last - origin + whole_frames(target - last, dur) * dur;
                }
                let idx = ts.partition_point(|&t| t <= target + EPSILON).saturating_sub(1);
                let start = ts[idx];
                let next = ts[idx + 1];
                if nearest && next - target < target - start {
                    next - origin
                } else {
                    start - origin
                }
            }
        }
    }
}
