//! Shared data models.

mod enums;

pub use enums::{DurationAlignFallback, MergePreference, RoundingPolicy, SnapMode};
