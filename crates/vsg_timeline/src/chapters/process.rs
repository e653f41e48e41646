//! Chapter processing pipeline.
//!
//! Correction, then optional snapping, then end-time normalisation, then
//! optional renaming. The input list is never modified.

use super::shifter::{apply_correction, normalize_end_times, rename_chapters};
use super::snapper::{snap_chapters, SnapSettings, SnapStats};
use super::types::{AnchorSet, Chapter};
use crate::config::ChapterSettings;
use crate::correction::CorrectionResult;
use crate::models::SnapMode;

/// Chapters ready for the mux stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedChapters {
    pub chapters: Vec<Chapter>,
    /// Present when snapping ran.
    pub snap: Option<SnapStats>,
}

/// Run the full pipeline. `None` when the correction is FAILED.
pub fn process_chapters(
    chapters: &[Chapter],
    correction: &CorrectionResult,
    anchors: Option<&AnchorSet>,
    settings: &ChapterSettings,
) -> Option<ProcessedChapters> {
    let mut current = apply_correction(chapters, correction)?;

    let snap_settings = SnapSettings::from(settings);
    let snap = match (snap_settings.mode, anchors) {
        (SnapMode::None, _) => None,
        (_, None) => {
            tracing::warn!("[Chapters] Snapping enabled but no anchors supplied");
            None
        }
        (_, Some(anchors)) => {
            let (snapped, stats) = snap_chapters(&current, anchors, &snap_settings);
            current = snapped;
            Some(stats)
        }
    };

    current = normalize_end_times(&current);
    if settings.rename {
        current = rename_chapters(&current);
    }

    Some(ProcessedChapters {
        chapters: current,
        snap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_pipeline() {
        let chapters = vec![
            Chapter::new(0.0, "Opening"),
            Chapter::new(60_000.0, "Episode"),
            Chapter::new(1_300_000.0, "Ending"),
        ];
        let anchors = AnchorSet::new([60_100.0, 1_300_200.0]);
        let settings = ChapterSettings {
            rename: true,
            snap_enabled: true,
            snap_mode: SnapMode::Nearest,
            ..Default::default()
        };

        let out = process_chapters(&chapters, &CorrectionResult::uniform(50.0), Some(&anchors), &settings)
            .unwrap();

        let starts: Vec<f64> = out.chapters.iter().map(|c| c.start_ms).collect();
        assert_eq!(starts, vec![50.0, 60_100.0, 1_300_200.0]);
        assert_eq!(out.chapters[0].end_ms, Some(60_100.0));
        assert_eq!(out.chapters[2].title, "Chapter 03");
        let stats = out.snap.unwrap();
        assert_eq!(stats.moved, 2);
        assert_eq!(stats.too_far, 1);
    }

    #[test]
    fn snapping_disabled_by_default() {
        let chapters = vec![Chapter::new(1000.0, "A")];
        let anchors = AnchorSet::new([1010.0]);
        let out = process_chapters(
            &chapters,
            &CorrectionResult::uniform(0.0),
            Some(&anchors),
            &ChapterSettings::default(),
        )
        .unwrap();

        assert!(out.snap.is_none());
        assert_eq!(out.chapters[0].start_ms, 1000.0);
        assert_eq!(out.chapters[0].title, "A");
    }
}
