//! Scene-cut detection collaborator and a built-in content detector.

use std::path::Path;
use std::sync::Arc;

use image::imageops::FilterType;
use image::GrayImage;

use crate::error::{SyncError, TimelineResult};
use crate::frame_utils::VideoDecoder;

/// Side length frames are reduced to before comparison.
const COMPARE_SIZE: u32 = 32;

/// Detection sensitivity for one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    /// Mean absolute luma change (0-255) that counts as a cut.
    pub threshold: f64,
    /// Minimum frames between two cuts.
    pub min_scene_len: u32,
}

/// Finds content cuts inside a frame window.
pub trait SceneDetector: Send + Sync {
    /// Start frame of every scene in `[start_frame, end_frame]`, ascending.
    ///
    /// The first entry is the scene already running at `start_frame`; every
    /// later entry is the first frame after a cut.
    fn detect_scenes(
        &self,
        video: &Path,
        start_frame: u32,
        end_frame: u32,
        params: DetectionParams,
    ) -> TimelineResult<Vec<u32>>;
}

/// Adjacent-frame luma difference detector on top of a [`VideoDecoder`].
pub struct ContentDetector {
    decoder: Arc<dyn VideoDecoder>,
}

impl ContentDetector {
    pub fn new(decoder: Arc<dyn VideoDecoder>) -> Self {
        Self { decoder }
    }
}

fn reduce(frame: &image::DynamicImage) -> GrayImage {
    image::imageops::resize(&frame.to_luma8(), COMPARE_SIZE, COMPARE_SIZE, FilterType::Triangle)
}

/// Mean absolute per-pixel difference of two equally sized luma images.
pub fn content_delta(a: &GrayImage, b: &GrayImage) -> f64 {
    let total: u64 = a
        .pixels()
        .zip(b.pixels())
        .map(|(pa, pb)| pa[0].abs_diff(pb[0]) as u64)
        .sum();
    total as f64 / (a.width() * a.height()).max(1) as f64
}

impl SceneDetector for ContentDetector {
    fn detect_scenes(
        &self,
        video: &Path,
        start_frame: u32,
        end_frame: u32,
        params: DetectionParams,
    ) -> TimelineResult<Vec<u32>> {
        let reader = self.decoder.open(video)?;
        let last = reader.frame_count().saturating_sub(1);
        let end_frame = end_frame.min(last);
        if start_frame > end_frame {
            return Err(SyncError::anchor_unavailable(format!(
                "window {start_frame}..={end_frame} is outside the video"
            )));
        }

        let mut starts = vec![start_frame];
        let mut previous = reduce(&reader.get_frame(start_frame)?);
        let mut last_cut = start_frame;

        for frame in start_frame + 1..=end_frame {
            let current = reduce(&reader.get_frame(frame)?);
            let delta = content_delta(&previous, &current);
            if delta >= params.threshold && frame - last_cut >= params.min_scene_len {
                tracing::trace!("[SceneAnchors] Cut at frame {} (delta {:.1})", frame, delta);
                starts.push(frame);
                last_cut = frame;
            }
            previous = current;
        }

        Ok(starts)
    }
}
