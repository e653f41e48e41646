//! Scene-change anchoring.

mod anchors;
mod detector;

pub use anchors::{anchor_times_ms, cut_times_ms, find_scene_anchors, AnchorSearch};
pub use detector::{content_delta, ContentDetector, DetectionParams, SceneDetector};
