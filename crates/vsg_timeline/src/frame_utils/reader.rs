//! Video decode collaborator.
//!
//! The engine never decodes video itself. Hosts plug in a [`VideoDecoder`]
//! (VapourSynth, FFmpeg, a test double, ...) that opens a path and hands
//! back a [`VideoReader`]. Readers are dropped as soon as the caller has
//! what it needs; nothing in this crate keeps one open across calls.

use std::path::Path;

use image::DynamicImage;

use crate::error::FrameError;

/// Frame-accurate access to one opened video.
pub trait VideoReader: Send + Sync {
    /// Total frame count.
    fn frame_count(&self) -> u32;

    /// Nominal frame rate.
    fn fps(&self) -> f64;

    /// Whether frame presentation times are irregular.
    ///
    /// When true, the frame index reads [`get_pts`](Self::get_pts) for every
    /// frame and builds a VFR timestamp table.
    fn is_vfr(&self) -> bool {
        false
    }

    /// Presentation time of a frame in milliseconds.
    fn get_pts(&self, index: u32) -> Result<f64, FrameError>;

    /// Decode a frame by index.
    fn get_frame(&self, index: u32) -> Result<DynamicImage, FrameError>;

    /// Backend name, for logs.
    fn backend_name(&self) -> &str;
}

/// Opens videos. Implementations must be cheap to share across threads.
pub trait VideoDecoder: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoReader>, FrameError>;
}
