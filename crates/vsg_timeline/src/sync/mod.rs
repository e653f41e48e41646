//! Sync-mode strategies.
//!
//! Each strategy turns reference/secondary track metadata plus a delay
//! sampling collaborator into a [`CorrectionResult`] for the secondary
//! track.
//!
//! # Architecture
//!
//! Modes are a closed set: [`SyncModeType`] names them and
//! [`create_sync_mode`] is the only way to build one. The mode is chosen
//! once per job; falling back to another mode after a FAILED verdict is
//! the caller's decision.
//!
//! # Available Modes
//!
//! - **TimeBased**: standard chunk plan, classified, applied as-is.
//! - **TimebaseFrameLocked**: as TimeBased, delays aligned to frame starts.
//! - **DurationAlign**: offset from the difference in durations.
//! - **CorrelationFrameSnap**: standard plan, snapped to whole frames.
//! - **SubtitleAnchoredFrameSnap**: samples at subtitle event starts.
//! - **CorrelationGuidedFrameAnchor**: dense windows at fixed anchors.
//! - **VideoVerified**: frame snap plus a scene-cut cross-check.

mod correlation_frame_snap;
mod correlation_guided;
mod duration_align;
pub mod sampling;
mod subtitle_anchored;
mod time_based;
mod timebase_frame_locked;
mod video_verified;

pub use correlation_frame_snap::CorrelationFrameSnap;
pub use correlation_guided::CorrelationGuidedFrameAnchor;
pub use duration_align::DurationAlign;
pub use subtitle_anchored::SubtitleAnchoredFrameSnap;
pub use time_based::TimeBased;
pub use timebase_frame_locked::TimebaseFrameLocked;
pub use video_verified::{AnchorVerification, VideoVerified};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::correction::{
    classify, Classification, ClassifyOptions, CorrectionData, CorrectionResult, DelaySample,
    SegmentReport,
};
use crate::error::{SampleError, TimelineResult};
use crate::frame_utils::{FrameIndexCache, Timebase, VideoDecoder};
use crate::scene::SceneDetector;

/// Available sync mode types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncModeType {
    /// Pure offset.
    #[default]
    TimeBased,
    /// Offset aligned to frame boundaries.
    TimebaseFrameLocked,
    /// Offset from the duration difference.
    DurationAlign,
    /// Correlation snapped to the nearest frame.
    CorrelationFrameSnap,
    /// Correlation sampled at subtitle events.
    SubtitleAnchoredFrameSnap,
    /// Piecewise correlation around fixed anchors.
    CorrelationGuidedFrameAnchor,
    /// Frame snap verified against scene cuts.
    VideoVerified,
}

impl SyncModeType {
    pub const ALL: [SyncModeType; 7] = [
        Self::TimeBased,
        Self::TimebaseFrameLocked,
        Self::DurationAlign,
        Self::CorrelationFrameSnap,
        Self::SubtitleAnchoredFrameSnap,
        Self::CorrelationGuidedFrameAnchor,
        Self::VideoVerified,
    ];

    /// Get the display name for this mode.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TimeBased => "time-based",
            Self::TimebaseFrameLocked => "timebase-frame-locked",
            Self::DurationAlign => "duration-align",
            Self::CorrelationFrameSnap => "correlation-frame-snap",
            Self::SubtitleAnchoredFrameSnap => "subtitle-anchored-frame-snap",
            Self::CorrelationGuidedFrameAnchor => "correlation-guided-frame-anchor",
            Self::VideoVerified => "video-verified",
        }
    }

    /// Get a description of this mode.
    pub fn description(&self) -> &'static str {
        match self {
            Self::TimeBased => "Apply the classified delay as measured",
            Self::TimebaseFrameLocked => "Align the classified delay to reference frame starts",
            Self::DurationAlign => "Derive the delay from the difference in durations",
            Self::CorrelationFrameSnap => "Snap the classified delay to the nearest whole frame",
            Self::SubtitleAnchoredFrameSnap => {
                "Measure at subtitle events and snap to the nearest frame"
            }
            Self::CorrelationGuidedFrameAnchor => {
                "Measure dense windows at fixed anchors and snap to the nearest frame"
            }
            Self::VideoVerified => "Snap to frames and verify against scene cuts",
        }
    }
}

impl std::fmt::Display for SyncModeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One delay measurement from the correlation collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayMeasurement {
    pub delay_ms: f64,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

impl DelayMeasurement {
    pub fn new(delay_ms: f64, confidence: f64) -> Self {
        Self {
            delay_ms,
            confidence,
        }
    }
}

/// Measures the delay of the secondary track at a reference timestamp.
///
/// Calls may block for seconds. A failed call is a missing sample.
pub trait DelaySampler {
    fn sample(&self, timestamp_s: f64) -> Result<DelayMeasurement, SampleError>;
}

impl<F> DelaySampler for F
where
    F: Fn(f64) -> Result<DelayMeasurement, SampleError>,
{
    fn sample(&self, timestamp_s: f64) -> Result<DelayMeasurement, SampleError> {
        self(timestamp_s)
    }
}

/// Track metadata a strategy works from.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub label: String,
    pub duration_ms: f64,
    pub video_path: Option<PathBuf>,
    pub timebase: Option<Timebase>,
}

impl TrackInfo {
    /// Audio-only (or timing-unknown) track.
    pub fn new(label: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            label: label.into(),
            duration_ms,
            video_path: None,
            timebase: None,
        }
    }

    /// Video track with its timing read through the frame index cache.
    pub fn from_video(
        label: impl Into<String>,
        video: &Path,
        cache: &FrameIndexCache,
    ) -> TimelineResult<Self> {
        let timebase = cache.timebase(video)?;
        Ok(Self {
            label: label.into(),
            duration_ms: timebase.duration_ms(),
            video_path: Some(video.to_path_buf()),
            timebase: Some(timebase),
        })
    }

    pub fn with_video(mut self, path: impl Into<PathBuf>, timebase: Timebase) -> Self {
        self.video_path = Some(path.into());
        self.timebase = Some(timebase);
        self
    }
}

/// Frame-level collaborators for verification.
#[derive(Clone, Copy)]
pub struct VideoAccess<'a> {
    pub decoder: &'a dyn VideoDecoder,
    pub detector: &'a dyn SceneDetector,
}

/// Everything one strategy invocation reads.
#[derive(Clone, Copy)]
pub struct SyncRequest<'a> {
    pub reference: &'a TrackInfo,
    pub secondary: &'a TrackInfo,
    pub sampler: &'a dyn DelaySampler,
    pub settings: &'a Settings,
    /// Subtitle event start times (ms, reference timeline).
    pub anchor_hints_ms: &'a [f64],
    pub video: Option<VideoAccess<'a>>,
}

impl<'a> SyncRequest<'a> {
    pub fn new(
        reference: &'a TrackInfo,
        secondary: &'a TrackInfo,
        sampler: &'a dyn DelaySampler,
        settings: &'a Settings,
    ) -> Self {
        Self {
            reference,
            secondary,
            sampler,
            settings,
            anchor_hints_ms: &[],
            video: None,
        }
    }

    pub fn with_anchor_hints(mut self, hints_ms: &'a [f64]) -> Self {
        self.anchor_hints_ms = hints_ms;
        self
    }

    pub fn with_video(mut self, video: VideoAccess<'a>) -> Self {
        self.video = Some(video);
        self
    }

    /// Timebase delays are snapped against: the reference, else the secondary.
    fn snap_timebase(&self) -> Option<&'a Timebase> {
        self.reference
            .timebase
            .as_ref()
            .or(self.secondary.timebase.as_ref())
    }
}

/// Outcome of one strategy invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResult {
    /// Mode that produced the correction.
    pub mode: SyncModeType,
    pub correction: CorrectionResult,
    /// Delays were aligned to frame boundaries.
    pub frame_snapped: bool,
    pub verification: Option<AnchorVerification>,
    /// Set when a stricter mode could not run and this one stood in.
    pub downgraded_from: Option<SyncModeType>,
    pub samples_requested: usize,
    pub samples_used: usize,
    pub segments: Vec<SegmentReport>,
    /// Summary message.
    pub summary: String,
}

impl SyncResult {
    fn new(mode: SyncModeType, correction: CorrectionResult) -> Self {
        let mut result = Self {
            mode,
            correction,
            frame_snapped: false,
            verification: None,
            downgraded_from: None,
            samples_requested: 0,
            samples_used: 0,
            segments: Vec::new(),
            summary: String::new(),
        };
        result.refresh_summary();
        result
    }

    fn from_classification(
        mode: SyncModeType,
        classification: Classification,
        samples_requested: usize,
    ) -> Self {
        let mut result = Self::new(mode, classification.result);
        result.samples_requested = samples_requested;
        result.samples_used = classification.usable_samples;
        result.segments = classification.segments;
        result.refresh_summary();
        result
    }

    fn refresh_summary(&mut self) {
        let mut summary = format!(
            "{}: {} ({}/{} samples)",
            self.mode,
            self.correction.summary(),
            self.samples_used,
            self.samples_requested
        );
        if self.frame_snapped {
            summary.push_str(", frame-snapped");
        }
        if let Some(verification) = &self.verification {
            summary.push_str(&format!(
                ", {}/{} anchors verified",
                verification.anchors_matched, verification.anchors_checked
            ));
        }
        if let Some(from) = self.downgraded_from {
            summary.push_str(&format!(", downgraded from {from}"));
        }
        self.summary = summary;
    }
}

/// Trait for sync mode implementations.
///
/// Implementations are stateless; one instance may serve any number of
/// requests.
pub trait SyncMode: Send + Sync {
    fn mode_type(&self) -> SyncModeType;

    fn name(&self) -> &str {
        self.mode_type().name()
    }

    fn description(&self) -> &str {
        self.mode_type().description()
    }

    /// Produce the correction for `request.secondary`.
    ///
    /// A correction that cannot be trusted is `Ok` with a FAILED verdict;
    /// `Err` is reserved for broken machinery (index builds, EDL assembly).
    fn apply(&self, request: &SyncRequest<'_>) -> TimelineResult<SyncResult>;
}

/// Create a sync mode from type enum.
pub fn create_sync_mode(mode: SyncModeType) -> Box<dyn SyncMode> {
    match mode {
        SyncModeType::TimeBased => Box::new(TimeBased),
        SyncModeType::TimebaseFrameLocked => Box::new(TimebaseFrameLocked),
        SyncModeType::DurationAlign => Box::new(DurationAlign),
        SyncModeType::CorrelationFrameSnap => Box::new(CorrelationFrameSnap),
        SyncModeType::SubtitleAnchoredFrameSnap => Box::new(SubtitleAnchoredFrameSnap),
        SyncModeType::CorrelationGuidedFrameAnchor => Box::new(CorrelationGuidedFrameAnchor),
        SyncModeType::VideoVerified => Box::new(VideoVerified),
    }
}

/// Measure every plan time. Failed measurements are logged and skipped.
fn collect_samples(sampler: &dyn DelaySampler, times_s: &[f64]) -> Vec<DelaySample> {
    times_s
        .iter()
        .filter_map(|&t| match sampler.sample(t) {
            Ok(m) => Some(DelaySample::new(t, m.delay_ms, m.confidence)),
            Err(e) => {
                tracing::warn!("[Sampling] {}", e);
                None
            }
        })
        .collect()
}

/// Sample `times_s` and classify the result over the reference timeline.
fn run_plan(
    mode: SyncModeType,
    request: &SyncRequest<'_>,
    times_s: &[f64],
) -> TimelineResult<SyncResult> {
    tracing::debug!(
        "[{}] Sampling {} points for '{}' against '{}'",
        mode,
        times_s.len(),
        request.secondary.label,
        request.reference.label
    );
    let samples = collect_samples(request.sampler, times_s);

    let duration_s = request.reference.duration_ms / 1000.0;
    let options = ClassifyOptions {
        timeline_start_s: 0.0,
        timeline_end_s: (duration_s > 0.0).then_some(duration_s),
        reference_fps: request.reference.timebase.as_ref().map(Timebase::fps),
    };
    let classification = classify(&samples, &request.settings.classifier, &options)?;
    Ok(SyncResult::from_classification(mode, classification, times_s.len()))
}

/// Apply `align` to the offset or to every segment delay.
fn align_correction(
    correction: &CorrectionResult,
    align: impl Fn(f64) -> f64,
) -> TimelineResult<CorrectionResult> {
    Ok(match correction.data() {
        CorrectionData::Offset(offset) => CorrectionResult::uniform(align(*offset)),
        CorrectionData::Segments(edl) => CorrectionResult::stepped(edl.map_delays(align)?),
        CorrectionData::Failure(_) => correction.clone(),
    })
}

/// Snap the result's delays to whole frames of the snap timebase.
///
/// Without any timebase the result is left as-is and a warning logged.
fn snap_to_nearest_frame(
    mut result: SyncResult,
    request: &SyncRequest<'_>,
) -> TimelineResult<SyncResult> {
    if result.correction.is_failed() {
        return Ok(result);
    }
    let Some(timebase) = request.snap_timebase() else {
        tracing::warn!(
            "[{}] No timebase for '{}', delays left unsnapped",
            result.mode,
            request.reference.label
        );
        return Ok(result);
    };

    result.correction = align_correction(&result.correction, |d| timebase.snap_offset_nearest(d))?;
    result.frame_snapped = true;
    result.refresh_summary();
    Ok(result)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn sync_mode_type_names_round_trip_serde() {
        for mode in SyncModeType::ALL {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.name()));
            let back: SyncModeType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, mode);
        }
    }

    #[test]
    fn factory_builds_every_mode() {
        for mode in SyncModeType::ALL {
            let strategy = create_sync_mode(mode);
            assert_eq!(strategy.mode_type(), mode);
            assert_eq!(strategy.name(), mode.name());
            assert!(!strategy.description().is_empty());
        }
    }

    #[test]
    fn failed_samples_are_skipped() {
        let sampler = |t: f64| {
            if t < 100.0 {
                Err(SampleError::new(t, "silence"))
            } else {
                Ok(DelayMeasurement::new(42.0, 0.9))
            }
        };
        let samples = collect_samples(&sampler, &[10.0, 150.0, 200.0]);
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.timestamp_s >= 100.0));
    }

    #[test]
    fn sampler_errors_never_fail_the_job() {
        let reference = reference_track();
        let secondary = secondary_track();
        let settings = Settings::default();
        let sampler = |t: f64| -> Result<DelayMeasurement, SampleError> {
            Err(SampleError::new(t, "decoder hiccup"))
        };
        let request = SyncRequest::new(&reference, &secondary, &sampler, &settings);

        let result = create_sync_mode(SyncModeType::TimeBased)
            .apply(&request)
            .unwrap();
        assert!(result.correction.is_failed());
        assert_eq!(result.samples_used, 0);
        assert_eq!(result.samples_requested, 10);
    }

    #[test]
    fn summary_mentions_mode_and_counts() {
        let reference = reference_track();
        let secondary = secondary_track();
        let settings = Settings::default();
        let sampler = constant_sampler(120.0);
        let request = SyncRequest::new(&reference, &secondary, &sampler, &settings);

        let result = TimeBased.apply(&request).unwrap();
        assert!(result.summary.starts_with("time-based: UNIFORM +120.0ms"));
        assert!(result.summary.contains("(10/10 samples)"));
    }
}
