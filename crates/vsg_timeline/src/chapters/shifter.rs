//! Chapter time transforms. Every function returns a new list.

use super::types::Chapter;
use crate::correction::{retime_ms, CorrectionResult};

/// Shortest chapter the normaliser leaves behind.
const MIN_CHAPTER_MS: f64 = 1.0;

/// Shift every chapter by `offset_ms`, clamping at zero.
pub fn shift_chapters(chapters: &[Chapter], offset_ms: f64) -> Vec<Chapter> {
    tracing::debug!("[Chapters] Shifting {} chapters by {:+.3}ms", chapters.len(), offset_ms);
    chapters
        .iter()
        .map(|c| Chapter {
            start_ms: (c.start_ms + offset_ms).max(0.0),
            end_ms: c.end_ms.map(|e| (e + offset_ms).max(0.0)),
            title: c.title.clone(),
        })
        .collect()
}

/// Apply a correction, EDL-aware: each boundary takes the delay in effect
/// at its own position. `None` for a FAILED correction.
pub fn apply_correction(chapters: &[Chapter], correction: &CorrectionResult) -> Option<Vec<Chapter>> {
    if correction.is_failed() {
        tracing::warn!("[Chapters] Correction failed, chapters left untouched");
        return None;
    }
    let shifted = chapters
        .iter()
        .map(|c| Chapter {
            start_ms: retime_ms(c.start_ms, correction).unwrap_or(c.start_ms),
            end_ms: c.end_ms.map(|e| retime_ms(e, correction).unwrap_or(e)),
            title: c.title.clone(),
        })
        .collect();
    Some(shifted)
}

/// Sort by start and make end times consistent.
///
/// A missing end becomes the next chapter's start (or start + 1ms for the
/// last). Ends never run past the next start and never sit less than 1ms
/// after their own start.
pub fn normalize_end_times(chapters: &[Chapter]) -> Vec<Chapter> {
    let mut sorted = chapters.to_vec();
    sorted.sort_by(|a, b| a.start_ms.total_cmp(&b.start_ms));

    let next_starts: Vec<Option<f64>> = (0..sorted.len())
        .map(|i| sorted.get(i + 1).map(|c| c.start_ms))
        .collect();

    for (chapter, next_start) in sorted.iter_mut().zip(next_starts) {
        let mut end = chapter
            .end_ms
            .or(next_start)
            .unwrap_or(chapter.start_ms + MIN_CHAPTER_MS);
        if let Some(next_start) = next_start {
            end = end.min(next_start);
        }
        chapter.end_ms = Some(end.max(chapter.start_ms + MIN_CHAPTER_MS));
    }
    sorted
}

/// Replace titles with "Chapter 01", "Chapter 02", ...
pub fn rename_chapters(chapters: &[Chapter]) -> Vec<Chapter> {
    chapters
        .iter()
        .enumerate()
        .map(|(i, c)| Chapter {
            title: format!("Chapter {:02}", i + 1),
            ..c.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::{AudioSegment, Edl};
    use crate::error::FailureCause;

    fn sample() -> Vec<Chapter> {
        vec![
            Chapter::new(0.0, "Intro").with_end(90_000.0),
            Chapter::new(90_000.0, "Part A"),
            Chapter::new(600_000.0, "Part B"),
        ]
    }

    #[test]
    fn shift_clamps_at_zero() {
        let shifted = shift_chapters(&sample(), -500.0);
        assert_eq!(shifted[0].start_ms, 0.0);
        assert_eq!(shifted[0].end_ms, Some(89_500.0));
        assert_eq!(shifted[1].start_ms, 89_500.0);
        assert_eq!(shifted[2].title, "Part B");
    }

    #[test]
    fn shift_leaves_input_untouched() {
        let original = sample();
        let _ = shift_chapters(&original, 1000.0);
        assert_eq!(original, sample());
    }

    #[test]
    fn stepped_correction_is_position_aware() {
        let edl = Edl::new(vec![
            AudioSegment::new(0.0, 300.0, 100.0),
            AudioSegment::new(300.0, 900.0, -900.0),
        ])
        .unwrap();
        let out = apply_correction(&sample(), &CorrectionResult::stepped(edl)).unwrap();

        assert_eq!(out[0].start_ms, 100.0);
        assert_eq!(out[1].start_ms, 90_100.0);
        assert_eq!(out[2].start_ms, 599_100.0);
    }

    #[test]
    fn failed_correction_is_not_applied() {
        let failed = CorrectionResult::failed(FailureCause::VerificationRejected {
            reason: "test".into(),
        });
        assert!(apply_correction(&sample(), &failed).is_none());
    }

    #[test]
    fn normalize_fills_and_clamps_ends() {
        let chapters = vec![
            Chapter::new(5000.0, "B"),
            Chapter::new(0.0, "A").with_end(7000.0),
            Chapter::new(9000.0, "C").with_end(8000.0),
        ];
        let out = normalize_end_times(&chapters);

        assert_eq!(out[0].title, "A");
        assert_eq!(out[0].end_ms, Some(5000.0));
        assert_eq!(out[1].end_ms, Some(9000.0));
        assert_eq!(out[2].end_ms, Some(9001.0));
    }

    #[test]
    fn rename_numbers_chapters() {
        let out = rename_chapters(&sample());
        let titles: Vec<&str> = out.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["Chapter 01", "Chapter 02", "Chapter 03"]);
        assert_eq!(out[1].start_ms, 90_000.0);
    }
}
