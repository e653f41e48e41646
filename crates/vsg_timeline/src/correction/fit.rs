//! Numeric fitting primitives for the classifier.

use super::types::DelaySample;

/// PAL speed-up (23.976 -> 25 fps) produces roughly this drift.
const PAL_DRIFT_MS_S: f64 = 40.9;
const PAL_DRIFT_TOLERANCE: f64 = 5.0;

/// Weighted least-squares line `delay = slope * t + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl LinearFit {
    pub fn at(&self, t_s: f64) -> f64 {
        self.slope * t_s + self.intercept
    }
}

/// Confidence-weighted mean delay. Falls back to the plain mean when all
/// weights are zero.
pub fn weighted_mean(samples: &[DelaySample]) -> f64 {
    let total_weight: f64 = samples.iter().map(|s| s.confidence).sum();
    if total_weight <= f64::EPSILON {
        return samples.iter().map(|s| s.delay_ms).sum::<f64>() / samples.len().max(1) as f64;
    }
    samples.iter().map(|s| s.delay_ms * s.confidence).sum::<f64>() / total_weight
}

/// Confidence-weighted regression of delay on time.
///
/// Returns `None` for fewer than two samples or when all samples share
/// one timestamp.
pub fn linear_regression(samples: &[DelaySample]) -> Option<LinearFit> {
    if samples.len() < 2 {
        return None;
    }

    let weight = |s: &DelaySample| s.confidence.max(f64::EPSILON);
    let w_sum: f64 = samples.iter().map(weight).sum();
    let t_mean = samples.iter().map(|s| weight(s) * s.timestamp_s).sum::<f64>() / w_sum;
    let d_mean = samples.iter().map(|s| weight(s) * s.delay_ms).sum::<f64>() / w_sum;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for s in samples {
        let dt = s.timestamp_s - t_mean;
        numerator += weight(s) * dt * (s.delay_ms - d_mean);
        denominator += weight(s) * dt * dt;
    }
    if denominator.abs() < 1e-10 {
        return None;
    }

    let slope = numerator / denominator;
    let intercept = d_mean - slope * t_mean;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for s in samples {
        let predicted = slope * s.timestamp_s + intercept;
        ss_res += weight(s) * (s.delay_ms - predicted).powi(2);
        ss_tot += weight(s) * (s.delay_ms - d_mean).powi(2);
    }
    let r_squared = if ss_tot.abs() < 1e-10 {
        1.0
    } else {
        (1.0 - ss_res / ss_tot).max(0.0)
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

/// Largest absolute deviation of any sample from `model`.
pub fn max_residual(samples: &[DelaySample], model: impl Fn(f64) -> f64) -> f64 {
    samples
        .iter()
        .map(|s| (s.delay_ms - model(s.timestamp_s)).abs())
        .fold(0.0, f64::max)
}

/// Whether a drift rate matches PAL speed-up on 25 fps content.
pub fn is_pal_drift(slope_ms_s: f64, fps: Option<f64>) -> bool {
    let is_pal_rate = fps.is_some_and(|fps| (fps - 25.0).abs() < 0.1);
    is_pal_rate && (slope_ms_s.abs() - PAL_DRIFT_MS_S).abs() < PAL_DRIFT_TOLERANCE
}
