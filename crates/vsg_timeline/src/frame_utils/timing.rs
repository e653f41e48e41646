//! Frame/time conversion functions.
//!
//! Pure, unclamped conversions under a constant frame rate. The clamped,
//! CFR/VFR-aware converter built on top of these is [`Timebase`](super::Timebase).
//!
//! NTSC rates are snapped to their exact rational form before any
//! arithmetic, so 24 frames at "23.976" fps is exactly 1001 ms rather than
//! 1001.001 ms.
//!
//! # Rounding policies
//!
//! - **Floor**: frame START. Deterministic, preferred for sync math.
//! - **Middle**: a frame maps back to the centre of its display window.
//! - **Aegisub**: frame start rounded up to the next centisecond.

use crate::models::RoundingPolicy;

/// Guards against a time sitting a hair under a frame boundary.
const EPSILON: f64 = 1e-6;

/// Exact rational form of common frame rates as `(numerator, denominator)`.
///
/// # Examples
/// ```
/// use vsg_timeline::frame_utils::timing::fps_to_fraction;
///
/// assert_eq!(fps_to_fraction(23.976), (24000, 1001));
/// assert_eq!(fps_to_fraction(25.0), (25, 1));
/// ```
pub fn fps_to_fraction(fps: f64) -> (u32, u32) {
    const NTSC: [(f64, u32); 4] = [(23.976, 24000), (29.97, 30000), (47.952, 48000), (59.94, 60000)];
    const INTEGRAL: [u32; 7] = [24, 25, 30, 48, 50, 60, 120];

    if let Some(&(_, num)) = NTSC.iter().find(|(rate, _)| (fps - rate).abs() < 0.01) {
        return (num, 1001);
    }
    if let Some(&rate) = INTEGRAL.iter().find(|&&rate| (fps - rate as f64).abs() < 0.01) {
        return (rate, 1);
    }
    ((fps * 1000.0).round() as u32, 1000)
}

/// Frame rate after snapping to its exact rational form.
pub fn exact_fps(fps: f64) -> f64 {
    let (num, den) = fps_to_fraction(fps);
    num as f64 / den as f64
}

/// Parse an fps given as a fraction ("24000/1001") or a plain number.
pub fn parse_fps_fraction(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => s.trim().parse().ok(),
    }
}

/// Duration of one frame in milliseconds.
pub fn frame_duration_ms(fps: f64) -> f64 {
    let (num, den) = fps_to_fraction(fps);
    1000.0 * den as f64 / num as f64
}

/// Convert a time to the frame displaying at that time.
///
/// # Examples
/// ```
/// use vsg_timeline::frame_utils::timing::time_to_frame;
/// use vsg_timeline::models::RoundingPolicy;
///
/// assert_eq!(time_to_frame(0.0, 23.976, RoundingPolicy::Floor), 0);
/// assert_eq!(time_to_frame(41.7, 23.976, RoundingPolicy::Floor), 0);
/// assert_eq!(time_to_frame(1001.0, 23.976, RoundingPolicy::Floor), 24);
/// ```
pub fn time_to_frame(time_ms: f64, fps: f64, policy: RoundingPolicy) -> i64 {
    let dur = frame_duration_ms(fps);
    match policy {
        RoundingPolicy::Floor => ((time_ms + EPSILON) / dur).floor() as i64,
        RoundingPolicy::Middle => (time_ms / dur - 0.5).round() as i64,
        // Aegisub times are frame starts pushed up by < 10ms, truncation recovers the frame.
        RoundingPolicy::Aegisub => (time_ms / dur).floor() as i64,
    }
}

/// Convert a frame to the time representing it under `policy`.
///
/// # Examples
/// ```
/// use vsg_timeline::frame_utils::timing::frame_to_time;
/// use vsg_timeline::models::RoundingPolicy;
///
/// assert!((frame_to_time(24, 23.976, RoundingPolicy::Floor) - 1001.0).abs() < 1e-9);
/// assert_eq!(frame_to_time(24, 23.976, RoundingPolicy::Aegisub), 1010.0);
/// ```
pub fn frame_to_time(frame: i64, fps: f64, policy: RoundingPolicy) -> f64 {
    let dur = frame_duration_ms(fps);
    match policy {
        RoundingPolicy::Floor => frame as f64 * dur,
        RoundingPolicy::Middle => ((frame as f64 + 0.5) * dur).round(),
        RoundingPolicy::Aegisub => ceil_to_centisecond(frame as f64 * dur),
    }
}

/// Round a millisecond time up to the next 10ms boundary.
pub fn ceil_to_centisecond(time_ms: f64) -> f64 {
    // Strip float noise first so an exact 1000.0 stays 1000.0.
    let cs = time_ms / 10.0;
    let snapped = if (cs - cs.round()).abs() < EPSILON {
        cs.round()
    } else {
        cs.ceil()
    };
    snapped * 10.0
}

/// Frame offsets to try around a predicted match, nearest first:
/// `0, -1, 1, -2, 2, ...`.
pub fn frame_search_offsets(search_range_frames: u32) -> Vec<i64> {
    let range = search_range_frames as i64;
    let mut offsets = Vec::with_capacity(2 * search_range_frames as usize + 1);
    offsets.push(0);
    for delta in 1..=range {
        offsets.push(-delta);
        offsets.push(delta);
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_frame_boundaries() {
        let fps = 23.976;
        assert_eq!(time_to_frame(0.0, fps, RoundingPolicy::Floor), 0);
        assert_eq!(time_to_frame(41.0, fps, RoundingPolicy::Floor), 0);
        assert_eq!(time_to_frame(42.0, fps, RoundingPolicy::Floor), 1);
        assert_eq!(time_to_frame(1001.0, fps, RoundingPolicy::Floor), 24);
    }

    #[test]
    fn floor_frame_to_time() {
        let fps = 23.976;
        assert!((frame_to_time(0, fps, RoundingPolicy::Floor) - 0.0).abs() < 1e-9);
        assert!((frame_to_time(1, fps, RoundingPolicy::Floor) - 41.708333).abs() < 0.001);
        assert!((frame_to_time(24, fps, RoundingPolicy::Floor) - 1001.0).abs() < 1e-9);
    }

    #[test]
    fn floor_roundtrip_is_exact_on_frame_starts() {
        let fps = 23.976;
        for frame in 0..500 {
            let t = frame_to_time(frame, fps, RoundingPolicy::Floor);
            assert_eq!(time_to_frame(t, fps, RoundingPolicy::Floor), frame);
        }
    }

    #[test]
    fn middle_maps_to_frame_centre() {
        let fps = 23.976;
        assert_eq!(frame_to_time(0, fps, RoundingPolicy::Middle), 21.0);
        assert_eq!(time_to_frame(21.0, fps, RoundingPolicy::Middle), 0);
        assert_eq!(time_to_frame(63.0, fps, RoundingPolicy::Middle), 1);
    }

    #[test]
    fn aegisub_ceils_to_centisecond() {
        let fps = 23.976;
        assert_eq!(frame_to_time(1, fps, RoundingPolicy::Aegisub), 50.0);
        assert_eq!(frame_to_time(24, fps, RoundingPolicy::Aegisub), 1010.0);
        assert_eq!(time_to_frame(1010.0, fps, RoundingPolicy::Aegisub), 24);
        assert_eq!(frame_to_time(25, 25.0, RoundingPolicy::Aegisub), 1000.0);
    }

    #[test]
    fn fraction_snapping() {
        assert_eq!(fps_to_fraction(29.97), (30000, 1001));
        assert_eq!(fps_to_fraction(59.94), (60000, 1001));
        assert_eq!(fps_to_fraction(24.0), (24, 1));
        assert_eq!(fps_to_fraction(12.5), (12500, 1000));
        assert!((exact_fps(23.976) - 23.976_023_976).abs() < 1e-6);
    }

    #[test]
    fn parse_fraction_forms() {
        assert!((parse_fps_fraction("24000/1001").unwrap() - 23.976).abs() < 0.001);
        assert_eq!(parse_fps_fraction("25"), Some(25.0));
        assert_eq!(parse_fps_fraction("30/0"), None);
        assert_eq!(parse_fps_fraction("abc"), None);
    }

    #[test]
    fn search_offsets_nearest_first() {
        assert_eq!(frame_search_offsets(0), vec![0]);
        assert_eq!(frame_search_offsets(2), vec![0, -1, 1, -2, 2]);
    }

    #[test]
    fn negative_times_floor_downward() {
        assert_eq!(time_to_frame(-10.0, 25.0, RoundingPolicy::Floor), -1);
    }
}
