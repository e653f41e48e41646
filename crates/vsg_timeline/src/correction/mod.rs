//! Correction classification and application.
//!
//! - [`classify`]: UNIFORM / STEPPED / FAILED from delay samples
//! - [`Edl`]/[`AudioSegment`]: the stepped correction timeline
//! - [`retime_spans`]: apply a correction to event timings

mod classifier;
mod edl;
mod fit;
mod retime;
mod types;

pub use classifier::{classify, Classification, ClassifyOptions, DriftKind, SegmentReport};
pub use edl::{AudioSegment, Edl};
pub use fit::{is_pal_drift, linear_regression, LinearFit};
pub use retime::{retime_ms, retime_spans, FrameSnap, TimeSpan};
pub use types::{CorrectionData, CorrectionResult, CorrectionVerdict, DelaySample};
