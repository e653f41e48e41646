//! Chapter timing: correction, boundary snapping and normalisation.
//!
//! All transforms are pure and return new lists; a `Chapter` is never
//! modified in place.

mod process;
mod shifter;
mod snapper;
mod types;
mod xml;

pub use process::{process_chapters, ProcessedChapters};
pub use shifter::{apply_correction, normalize_end_times, rename_chapters, shift_chapters};
pub use snapper::{snap_chapters, SnapSettings, SnapStats};
pub use types::{format_timestamp_ms, AnchorSet, Chapter};
pub use xml::{parse_chapter_file, parse_chapter_xml, parse_timestamp_ms};
