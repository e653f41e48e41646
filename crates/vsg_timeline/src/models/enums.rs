//! Enumerated types shared across the engine.

use serde::{Deserialize, Serialize};

/// How a millisecond time is quantized to a frame and back.
///
/// The three policies are not mutually invertible to bit-exact precision,
/// so every timestamp must be converted under the policy it was produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingPolicy {
    /// Frame start: `floor(t / frame_duration)`.
    #[default]
    Floor,
    /// Frame centre: a time maps back to the middle of its frame.
    Middle,
    /// Frame start rounded up to the next centisecond, matching how
    /// subtitle editors store event times.
    Aegisub,
}

/// Which neighbour absorbs a segment that is too short to stand alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePreference {
    /// Merge into whichever neighbour yields the lower combined residual.
    #[default]
    LowerResidual,
    /// Always merge into the preceding segment when one exists.
    Earlier,
    /// Always merge into the following segment when one exists.
    Later,
}

/// Mode for snapping chapter boundaries to anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapMode {
    /// Snap to the closest anchor at or before the boundary.
    #[default]
    Previous,
    /// Snap to the closest anchor at or after the boundary.
    Next,
    /// Snap to the closest anchor in either direction.
    Nearest,
    /// Pass-through.
    None,
}

/// What duration-align does when sampled delays disagree with the
/// duration difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DurationAlignFallback {
    /// Return a FAILED verdict.
    #[default]
    Abort,
    /// Keep the duration-derived offset and log a warning.
    UseDuration,
}
