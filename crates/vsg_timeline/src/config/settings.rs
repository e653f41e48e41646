//! Settings struct with TOML-based sections.
//!
//! A `Settings` value is built once at job start and passed by reference
//! from then on. Every field has a serde default so partial documents load.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::models::{DurationAlignFallback, MergePreference, RoundingPolicy, SnapMode};
use crate::sync::SyncModeType;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Correction classifier thresholds.
    #[serde(default)]
    pub classifier: ClassifierSettings,

    /// Where delay samples are drawn.
    #[serde(default)]
    pub sampling: SamplingSettings,

    /// Frame/time conversion and index cache.
    #[serde(default)]
    pub timing: TimingSettings,

    /// Scene-change anchor detection.
    #[serde(default)]
    pub scene: SceneSettings,

    /// Frame-hash verification (video-verified mode).
    #[serde(default)]
    pub verification: VerificationSettings,

    /// Sync-mode selection and per-mode knobs.
    #[serde(default)]
    pub strategy: StrategySettings,

    /// Chapter handling.
    #[serde(default)]
    pub chapters: ChapterSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub level: LogLevel,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
        }
    }
}

/// Thresholds for the UNIFORM / STEPPED / FAILED decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Minimum usable samples before any model is attempted.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Max residual (ms) for a constant fit to count as UNIFORM.
    #[serde(default = "default_uniform_tolerance_ms")]
    pub uniform_tolerance_ms: f64,

    /// Jump between consecutive samples (ms) that opens a new segment.
    #[serde(default = "default_step_threshold_ms")]
    pub step_threshold_ms: f64,

    /// Samples below this confidence are ignored.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Segments shorter than this are merged into a neighbour.
    #[serde(default = "default_min_segment_duration_s")]
    pub min_segment_duration_s: f64,

    /// Segments with fewer samples than this are merged into a neighbour.
    #[serde(default = "default_min_segment_samples")]
    pub min_segment_samples: usize,

    /// Samples needed before a segment may be fitted with drift.
    #[serde(default = "default_drift_min_samples")]
    pub drift_min_samples: usize,

    /// Smallest |slope| (ms/s) treated as real drift.
    #[serde(default = "default_min_drift_rate")]
    pub min_drift_rate_ms_s: f64,

    /// Minimum R² for a drift fit.
    #[serde(default = "default_drift_r2_threshold")]
    pub drift_r2_threshold: f64,

    #[serde(default)]
    pub merge_preference: MergePreference,
}

fn default_min_samples() -> usize {
    3
}
fn default_uniform_tolerance_ms() -> f64 {
    5.0
}
fn default_step_threshold_ms() -> f64 {
    50.0
}
fn default_min_confidence() -> f64 {
    0.05
}
fn default_min_segment_duration_s() -> f64 {
    1.0
}
fn default_min_segment_samples() -> usize {
    2
}
fn default_drift_min_samples() -> usize {
    4
}
fn default_min_drift_rate() -> f64 {
    0.5
}
fn default_drift_r2_threshold() -> f64 {
    0.9
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            uniform_tolerance_ms: default_uniform_tolerance_ms(),
            step_threshold_ms: default_step_threshold_ms(),
            min_confidence: default_min_confidence(),
            min_segment_duration_s: default_min_segment_duration_s(),
            min_segment_samples: default_min_segment_samples(),
            drift_min_samples: default_drift_min_samples(),
            min_drift_rate_ms_s: default_min_drift_rate(),
            drift_r2_threshold: default_drift_r2_threshold(),
            merge_preference: MergePreference::default(),
        }
    }
}

/// Standard chunk plan: `chunk_count` evenly spaced timestamps across
/// `[scan_start_pct, scan_end_pct]` of the reference duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingSettings {
    #[serde(default = "default_chunk_count")]
    pub chunk_count: usize,

    #[serde(default = "default_scan_start_pct")]
    pub scan_start_pct: f64,

    #[serde(default = "default_scan_end_pct")]
    pub scan_end_pct: f64,
}

fn default_chunk_count() -> usize {
    10
}
fn default_scan_start_pct() -> f64 {
    5.0
}
fn default_scan_end_pct() -> f64 {
    95.0
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            chunk_count: default_chunk_count(),
            scan_start_pct: default_scan_start_pct(),
            scan_end_pct: default_scan_end_pct(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    /// Rounding policy for frame-locked alignment and retiming.
    #[serde(default)]
    pub rounding: RoundingPolicy,

    /// Directory holding persisted frame index artifacts.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

fn default_cache_dir() -> String {
    ".vsg_index".to_string()
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            rounding: RoundingPolicy::default(),
            cache_dir: default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSettings {
    /// Content-change threshold (0-255 luma scale).
    #[serde(default = "default_scene_threshold")]
    pub threshold: f64,

    #[serde(default = "default_min_scene_len")]
    pub min_scene_len: u32,

    /// More sensitive threshold for the single retry.
    #[serde(default = "default_fallback_threshold")]
    pub fallback_threshold: f64,

    #[serde(default = "default_fallback_min_scene_len")]
    pub fallback_min_scene_len: u32,

    #[serde(default = "default_max_anchors")]
    pub max_anchors: usize,
}

fn default_scene_threshold() -> f64 {
    27.0
}
fn default_min_scene_len() -> u32 {
    15
}
fn default_fallback_threshold() -> f64 {
    15.0
}
fn default_fallback_min_scene_len() -> u32 {
    10
}
fn default_max_anchors() -> usize {
    10
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            threshold: default_scene_threshold(),
            min_scene_len: default_min_scene_len(),
            fallback_threshold: default_fallback_threshold(),
            fallback_min_scene_len: default_fallback_min_scene_len(),
            max_anchors: default_max_anchors(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSettings {
    /// Frames searched either side of the predicted match.
    #[serde(default = "default_search_range_frames")]
    pub search_range_frames: u32,

    /// Perceptual hash edge length (8 -> 64 bits).
    #[serde(default = "default_hash_size")]
    pub hash_size: u8,

    /// Max hamming distance for two frames to count as the same picture.
    #[serde(default = "default_hash_threshold")]
    pub hash_threshold: u32,

    /// Fraction of anchors that must match to accept the correction.
    #[serde(default = "default_min_match_fraction")]
    pub min_match_fraction: f64,

    /// Anchors checked per job.
    #[serde(default = "default_num_checkpoints")]
    pub num_checkpoints: usize,
}

fn default_search_range_frames() -> u32 {
    3
}
fn default_hash_size() -> u8 {
    8
}
fn default_hash_threshold() -> u32 {
    12
}
fn default_min_match_fraction() -> f64 {
    0.5
}
fn default_num_checkpoints() -> usize {
    5
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            search_range_frames: default_search_range_frames(),
            hash_size: default_hash_size(),
            hash_threshold: default_hash_threshold(),
            min_match_fraction: default_min_match_fraction(),
            num_checkpoints: default_num_checkpoints(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySettings {
    #[serde(default)]
    pub sync_mode: SyncModeType,

    /// Cross-check the duration offset against sampled delays.
    #[serde(default)]
    pub duration_align_verify: bool,

    #[serde(default)]
    pub duration_align_fallback: DurationAlignFallback,

    /// Agreement tolerance (ms) between independent offset estimates.
    #[serde(default = "default_frame_agreement_tolerance_ms")]
    pub frame_agreement_tolerance_ms: f64,

    /// Anchor positions for correlation-guided mode, percent of duration.
    #[serde(default = "default_anchor_positions_pct")]
    pub anchor_positions_pct: Vec<f64>,

    #[serde(default = "default_anchor_window_samples")]
    pub anchor_window_samples: usize,

    #[serde(default = "default_anchor_window_spacing_s")]
    pub anchor_window_spacing_s: f64,

    #[serde(default = "default_subtitle_checkpoint_count")]
    pub subtitle_checkpoint_count: usize,

    /// Subtitle events in the first/last N percent are skipped (OP/ED).
    #[serde(default = "default_subtitle_edge_exclusion_pct")]
    pub subtitle_edge_exclusion_pct: f64,
}

fn default_frame_agreement_tolerance_ms() -> f64 {
    100.0
}
fn default_anchor_positions_pct() -> Vec<f64> {
    vec![10.0, 50.0, 90.0]
}
fn default_anchor_window_samples() -> usize {
    3
}
fn default_anchor_window_spacing_s() -> f64 {
    1.0
}
fn default_subtitle_checkpoint_count() -> usize {
    3
}
fn default_subtitle_edge_exclusion_pct() -> f64 {
    10.0
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            sync_mode: SyncModeType::default(),
            duration_align_verify: false,
            duration_align_fallback: DurationAlignFallback::default(),
            frame_agreement_tolerance_ms: default_frame_agreement_tolerance_ms(),
            anchor_positions_pct: default_anchor_positions_pct(),
            anchor_window_samples: default_anchor_window_samples(),
            anchor_window_spacing_s: default_anchor_window_spacing_s(),
            subtitle_checkpoint_count: default_subtitle_checkpoint_count(),
            subtitle_edge_exclusion_pct: default_subtitle_edge_exclusion_pct(),
        }
    }
}

/// Chapter processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterSettings {
    /// Rename chapters to "Chapter NN".
    #[serde(default)]
    pub rename: bool,

    /// Snap chapters to anchors.
    #[serde(default)]
    pub snap_enabled: bool,

    #[serde(default)]
    pub snap_mode: SnapMode,

    /// Snap threshold in milliseconds.
    #[serde(default = "default_snap_threshold")]
    pub snap_threshold_ms: f64,

    /// Only snap chapter starts (not ends).
    #[serde(default = "default_true")]
    pub snap_starts_only: bool,
}

fn default_snap_threshold() -> f64 {
    250.0
}

fn default_true() -> bool {
    true
}

impl Default for ChapterSettings {
    fn default() -> Self {
        Self {
            rename: false,
            snap_enabled: false,
            snap_mode: SnapMode::default(),
            snap_threshold_ms: default_snap_threshold(),
            snap_starts_only: true,
        }
    }
}
