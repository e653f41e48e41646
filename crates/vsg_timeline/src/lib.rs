//! VSG Timeline - timeline sync and drift correction engine
//!
//! Decides, from noisy delay samples, whether a secondary stream is off
//! by a constant, drifting, or stepping against the reference, and turns
//! that decision into frame-accurate timing for subtitles and chapters.
//!
//! Measurement (audio correlation), decoding, scene detection and muxing
//! are collaborators plugged in through traits; this crate performs no
//! subprocess or network I/O.

pub mod chapters;
pub mod config;
pub mod correction;
pub mod error;
pub mod frame_utils;
pub mod logging;
pub mod models;
pub mod scene;
pub mod sync;

#[cfg(test)]
mod testing;

pub use config::Settings;
pub use correction::{classify, CorrectionResult, CorrectionVerdict, DelaySample, Edl};
pub use error::{FailureCause, SyncError, TimelineResult};
pub use frame_utils::{FrameIndexCache, Timebase};
pub use sync::{create_sync_mode, SyncMode, SyncModeType, SyncRequest, SyncResult};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
