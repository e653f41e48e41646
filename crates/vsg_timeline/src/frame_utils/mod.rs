//! Frame-accurate timing.
//!
//! - [`timing`]: pure CFR conversions and fps helpers
//! - [`Timebase`]: clamped CFR/VFR converter for one video
//! - [`FrameIndexCache`]: per-video fps/frame_count/VFR table, cached on disk
//! - [`VideoDecoder`]/[`VideoReader`]: the decode collaborator
//! - [`hash`]: perceptual frame hashing for verification

pub mod hash;
mod index;
mod reader;
mod timebase;
pub mod timing;

pub use index::{FrameIndex, FrameIndexCache, IndexSource, ModTime};
pub use reader::{VideoDecoder, VideoReader};
pub use timebase::Timebase;
