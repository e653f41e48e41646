//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{DynamicImage, GrayImage, Luma};

use crate::error::FrameError;
use crate::frame_utils::{VideoDecoder, VideoReader};

/// Synthetic video: every scene is a distinct blocky noise pattern and all
/// frames inside a scene are identical.
#[derive(Debug, Clone)]
pub struct FakeVideo {
    pub fps: f64,
    pub frame_count: u32,
    pub pts: Option<Vec<f64>>,
    /// Content frames at which a new scene begins.
    pub scene_starts: Vec<i64>,
    /// Frame `i` of this video shows content frame `i + content_offset`.
    pub content_offset: i64,
}

impl FakeVideo {
    pub fn cfr(fps: f64, frame_count: u32) -> Self {
        Self {
            fps,
            frame_count,
            pts: None,
            scene_starts: Vec::new(),
            content_offset: 0,
        }
    }

    pub fn vfr(pts: Vec<f64>) -> Self {
        Self {
            fps: 24.0,
            frame_count: pts.len() as u32,
            pts: Some(pts),
            scene_starts: Vec::new(),
            content_offset: 0,
        }
    }

    pub fn with_scenes(mut self, scene_starts: Vec<i64>) -> Self {
        self.scene_starts = scene_starts;
        self
    }

    pub fn with_content_offset(mut self, offset: i64) -> Self {
        self.content_offset = offset;
        self
    }

    fn scene_of(&self, frame: u32) -> u64 {
        let content = frame as i64 + self.content_offset;
        self.scene_starts.iter().filter(|&&s| s <= content).count() as u64
    }
}

pub fn scene_image(scene: u64) -> DynamicImage {
    let mut img = GrayImage::new(64, 64);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let block = (x / 8) as u64 * 8 + (y / 8) as u64;
        let mut h = scene.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ block.wrapping_mul(0xBF58_476D_1CE4_E5B9);
        h ^= h >> 29;
        h = h.wrapping_mul(0x94D0_49BB_1331_11EB);
        h ^= h >> 32;
        *px = Luma([(h & 0xFF) as u8]);
    }
    DynamicImage::ImageLuma8(img)
}

pub struct FakeReader {
    video: FakeVideo,
}

impl VideoReader for FakeReader {
    fn frame_count(&self) -> u32 {
        self.video.frame_count
    }

    fn fps(&self) -> f64 {
        self.video.fps
    }

    fn is_vfr(&self) -> bool {
        self.video.pts.is_some()
    }

    fn get_pts(&self, index: u32) -> Result<f64, FrameError> {
        match &self.video.pts {
            Some(pts) => pts.get(index as usize).copied().ok_or(FrameError::OutOfRange {
                index,
                frame_count: self.video.frame_count,
            }),
            None => Ok(index as f64 * 1000.0 / self.video.fps),
        }
    }

    fn get_frame(&self, index: u32) -> Result<DynamicImage, FrameError> {
        if index >= self.video.frame_count {
            return Err(FrameError::OutOfRange {
                index,
                frame_count: self.video.frame_count,
            });
        }
        Ok(scene_image(self.video.scene_of(index)))
    }

    fn backend_name(&self) -> &str {
        "fake"
    }
}

/// Decoder serving [`FakeVideo`]s by file name, counting opens.
pub struct FakeDecoder {
    default: Option<FakeVideo>,
    by_name: HashMap<String, FakeVideo>,
    opens: AtomicUsize,
    open_delay: Duration,
}

impl FakeDecoder {
    pub fn new(video: FakeVideo) -> Self {
        Self {
            default: Some(video),
            by_name: HashMap::new(),
            opens: AtomicUsize::new(0),
            open_delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self {
            default: None,
            by_name: HashMap::new(),
            opens: AtomicUsize::new(0),
            open_delay: Duration::ZERO,
        }
    }

    pub fn with_video(mut self, file_name: &str, video: FakeVideo) -> Self {
        self.by_name.insert(file_name.to_string(), video);
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl VideoDecoder for FakeDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoReader>, FrameError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            std::thread::sleep(self.open_delay);
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let video = self
            .by_name
            .get(&name)
            .or(self.default.as_ref())
            .cloned()
            .ok_or_else(|| FrameError::open(path, "decoder unavailable"))?;
        Ok(Box::new(FakeReader { video }))
    }
}
