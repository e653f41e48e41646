//! Correction verdicts and results.

use serde::{Deserialize, Serialize};

use super::edl::Edl;
use crate::error::FailureCause;

/// One measured delay between reference and secondary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelaySample {
    /// Position on the target timeline.
    pub timestamp_s: f64,
    pub delay_ms: f64,
    /// Measurement confidence in `[0, 1]`.
    pub confidence: f64,
}

impl DelaySample {
    pub fn new(timestamp_s: f64, delay_ms: f64, confidence: f64) -> Self {
        Self {
            timestamp_s,
            delay_ms,
            confidence,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.timestamp_s.is_finite() && self.delay_ms.is_finite() && self.confidence.is_finite()
    }
}

/// Outcome of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrectionVerdict {
    /// A single offset explains every sample.
    Uniform,
    /// Discrete jumps, each segment with its own offset and drift.
    Stepped,
    /// No model fits; nothing should be applied.
    Failed,
}

impl std::fmt::Display for CorrectionVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uniform => "UNIFORM",
            Self::Stepped => "STEPPED",
            Self::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// Payload matching the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CorrectionData {
    Offset(f64),
    Segments(Edl),
    Failure(FailureCause),
}

/// Verdict plus payload. Immutable once built; the constructors keep the
/// two in agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionResult {
    verdict: CorrectionVerdict,
    data: CorrectionData,
}

impl CorrectionResult {
    pub fn uniform(offset_ms: f64) -> Self {
        Self {
            verdict: CorrectionVerdict::Uniform,
            data: CorrectionData::Offset(offset_ms),
        }
    }

    pub fn stepped(edl: Edl) -> Self {
        Self {
            verdict: CorrectionVerdict::Stepped,
            data: CorrectionData::Segments(edl),
        }
    }

    pub fn failed(cause: FailureCause) -> Self {
        Self {
            verdict: CorrectionVerdict::Failed,
            data: CorrectionData::Failure(cause),
        }
    }

    pub fn verdict(&self) -> CorrectionVerdict {
        self.verdict
    }

    pub fn data(&self) -> &CorrectionData {
        &self.data
    }

    pub fn is_failed(&self) -> bool {
        self.verdict == CorrectionVerdict::Failed
    }

    /// Offset of a UNIFORM result.
    pub fn offset(&self) -> Option<f64> {
        match self.data {
            CorrectionData::Offset(offset) => Some(offset),
            _ => None,
        }
    }

    /// EDL of a STEPPED result.
    pub fn edl(&self) -> Option<&Edl> {
        match &self.data {
            CorrectionData::Segments(edl) => Some(edl),
            _ => None,
        }
    }

    /// Cause of a FAILED result.
    pub fn failure(&self) -> Option<&FailureCause> {
        match &self.data {
            CorrectionData::Failure(cause) => Some(cause),
            _ => None,
        }
    }

    /// Delay to apply at `t_s`; `None` for FAILED.
    pub fn offset_at(&self, t_s: f64) -> Option<f64> {
        match &self.data {
            CorrectionData::Offset(offset) => Some(*offset),
            CorrectionData::Segments(edl) => edl.offset_at(t_s),
            CorrectionData::Failure(_) => None,
        }
    }

    /// One-line description for logs.
    pub fn summary(&self) -> String {
        match &self.data {
            CorrectionData::Offset(offset) => format!("UNIFORM {offset:+.1}ms"),
            CorrectionData::Segments(edl) => {
                let delays: Vec<String> = edl
                    .segments()
                    .iter()
                    .map(|s| {
                        if s.drift_rate_ms_s != 0.0 {
                            format!("{:+}ms@{:.1}s ({:+.2}ms/s)", s.delay_ms, s.start_s, s.drift_rate_ms_s)
                        } else {
                            format!("{:+}ms@{:.1}s", s.delay_ms, s.start_s)
                        }
                    })
                    .collect();
                format!("STEPPED [{}]", delays.join(", "))
            }
            CorrectionData::Failure(cause) => format!("FAILED ({cause})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::AudioSegment;

    #[test]
    fn verdict_matches_payload() {
        let uniform = CorrectionResult::uniform(42.0);
        assert_eq!(uniform.verdict(), CorrectionVerdict::Uniform);
        assert_eq!(uniform.offset(), Some(42.0));
        assert!(uniform.edl().is_none());

        let failed = CorrectionResult::failed(FailureCause::InsufficientSamples {
            usable: 0,
            required: 3,
        });
        assert!(failed.is_failed());
        assert_eq!(failed.offset_at(10.0), None);
    }

    #[test]
    fn stepped_offset_follows_edl() {
        let edl = Edl::new(vec![
            AudioSegment::new(0.0, 5.5, 100.0),
            AudioSegment::new(5.5, 10.0, 499.0),
        ])
        .unwrap();
        let result = CorrectionResult::stepped(edl);
        assert_eq!(result.offset_at(2.0), Some(100.0));
        assert_eq!(result.offset_at(8.0), Some(499.0));
        assert_eq!(result.summary(), "STEPPED [+100ms@0.0s, +499ms@5.5s]");
    }

    #[test]
    fn serializes_verdict_uppercase() {
        let json = serde_json::to_string(&CorrectionResult::uniform(1.5)).unwrap();
        assert!(json.contains("\"UNIFORM\""));
        let back: CorrectionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.offset(), Some(1.5));
    }
}
