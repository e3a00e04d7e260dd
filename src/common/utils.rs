//! Small numeric helpers shared by the engine and the manager.

use std::time::Duration;

use crate::common::constants::MAXIMUM_TRANSITION;

/// Linear interpolation of `x` on the line through `(x1, y1)` and `(x2, y2)`.
///
/// No clamping is applied; callers clamp when the curve should saturate.
pub fn lerp(x: f64, x1: f64, x2: f64, y1: f64, y2: f64) -> f64 {
    if x1 == x2 {
        return y1;
    }
    y1 + (x - x1) * (y2 - y1) / (x2 - x1)
}

/// Clamp `value` into `[min, max]` without panicking when `min > max`.
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Round `value` to the nearest multiple of `step`.
pub fn round_to_step(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}

/// Round to a fixed number of decimals.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// A transition in seconds as a sleepable duration.
///
/// Values from foreign calls are untrusted: negative and NaN become zero, and
/// anything longer than [`MAXIMUM_TRANSITION`] is capped.
pub fn transition_duration(seconds: f64) -> Duration {
    Duration::from_secs_f64(clamp(seconds, 0.0, MAXIMUM_TRANSITION))
}

/// Convert a brightness percentage (0-100) to the 0-255 device scale.
pub fn brightness_pct_to_value(pct: f64) -> u8 {
    clamp((pct * 255.0 / 100.0).round(), 0.0, 255.0) as u8
}

/// Convert a 0-255 device brightness to a percentage.
pub fn brightness_value_to_pct(value: u8) -> f64 {
    f64::from(value) * 100.0 / 255.0
}
