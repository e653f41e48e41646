//! Error types for the timeline engine.
//!
//! Two kinds of failure exist here. `SyncError` (and the errors it wraps)
//! are `Err` values: something in the machinery broke. `FailureCause` is
//! carried *inside* a FAILED [`CorrectionResult`](crate::correction::CorrectionResult):
//! the machinery worked, but no trustworthy correction could be derived.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-level error.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Segment contiguity was broken while assembling an EDL.
    #[error("EDL segment {index} ends at {end_s:.6}s but next segment starts at {next_start_s:.6}s")]
    InvalidSegmentInvariant {
        index: usize,
        end_s: f64,
        next_start_s: f64,
    },

    /// The decode collaborator could not produce fps/frame_count.
    #[error("Failed to build frame index for {path}: {message}")]
    IndexBuildFailure { path: PathBuf, message: String },

    /// Scene detection is missing or failed.
    #[error("Scene anchors unavailable: {0}")]
    AnchorUnavailable(String),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Chapter(#[from] ChapterError),
}

impl SyncError {
    pub fn index_build(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::IndexBuildFailure {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn anchor_unavailable(message: impl Into<String>) -> Self {
        Self::AnchorUnavailable(message.into())
    }
}

/// Diagnostic cause attached to a FAILED verdict.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    #[error("insufficient samples: {usable} usable, {required} required")]
    InsufficientSamples { usable: usize, required: usize },

    #[error("unresolvable residual on segment {segment}: {residual_ms:.1}ms exceeds {tolerance_ms:.1}ms")]
    UnresolvableResidual {
        segment: usize,
        residual_ms: f64,
        tolerance_ms: f64,
    },

    #[error("verification rejected the correction: {reason}")]
    VerificationRejected { reason: String },
}

/// Errors from the video decode collaborator.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Failed to open video {path}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("Failed to read frame {index}: {message}")]
    FrameRead { index: u32, message: String },

    #[error("Invalid video data: {0}")]
    InvalidData(String),

    #[error("Frame {index} out of range (frame count {frame_count})")]
    OutOfRange { index: u32, frame_count: u32 },
}

impl FrameError {
    pub fn open(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Open {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn frame_read(index: u32, message: impl Into<String>) -> Self {
        Self::FrameRead {
            index,
            message: message.into(),
        }
    }
}

/// A single delay measurement could not be taken. Treated as a missing
/// sample, never as a job failure.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Delay sample at {timestamp_s:.2}s failed: {message}")]
pub struct SampleError {
    pub timestamp_s: f64,
    pub message: String,
}

impl SampleError {
    pub fn new(timestamp_s: f64, message: impl Into<String>) -> Self {
        Self {
            timestamp_s,
            message: message.into(),
        }
    }
}

/// Errors reading chapter files.
#[derive(Error, Debug)]
pub enum ChapterError {
    #[error("Failed to read chapter file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed chapter XML: {0}")]
    MalformedXml(String),

    #[error("Invalid chapter timestamp '{0}'")]
    InvalidTimestamp(String),
}

/// Errors from loading or validating settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid setting {key}: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Result alias used across the crate.
pub type TimelineResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_cause_displays_counts() {
        let cause = FailureCause::InsufficientSamples {
            usable: 1,
            required: 3,
        };
        assert_eq!(cause.to_string(), "insufficient samples: 1 usable, 3 required");
    }

    #[test]
    fn frame_error_wraps_into_sync_error() {
        let err: SyncError = FrameError::open("/tmp/a.mkv", "no such file").into();
        assert!(matches!(err, SyncError::Frame(FrameError::Open { .. })));
        assert!(err.to_string().contains("/tmp/a.mkv"));
    }

    #[test]
    fn invariant_error_is_descriptive() {
        let err = SyncError::InvalidSegmentInvariant {
            index: 0,
            end_s: 5.0,
            next_start_s: 5.5,
        };
        assert!(err.to_string().contains("segment 0"));
    }
}
