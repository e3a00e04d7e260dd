//! Brightness curves.
//!
//! Every curve returns a percentage within `[min, max]`. The sun-anchored
//! curves take the signed number of seconds between the evaluation instant and
//! the closest sunrise or sunset.

use crate::common::constants::{TANH_DARK_FRACTION, TANH_LIGHT_FRACTION};
use crate::common::utils::{clamp, lerp};
use crate::geo::SunEvent;

/// Brightness bounds and ramp widths shared by the curves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessRange {
    pub min: f64,
    pub max: f64,
    /// Seconds on the dark side of sunrise/sunset
    pub time_dark: f64,
    /// Seconds on the light side of sunrise/sunset
    pub time_light: f64,
}

/// Full brightness while the sun is up, dimming towards `min` at midnight.
pub fn default_curve(sun_position: f64, range: &BrightnessRange) -> f64 {
    if sun_position > 0.0 {
        return range.max;
    }
    (range.max - range.min) * (1.0 + sun_position) + range.min
}

/// Anchors `(x1, x2)` on the time axis, where `x1` maps to `min` and `x2` to `max`.
fn anchors(event: SunEvent, range: &BrightnessRange) -> Option<(f64, f64)> {
    match event {
        SunEvent::Sunrise => Some((-range.time_dark, range.time_light)),
        SunEvent::Sunset => Some((range.time_dark, -range.time_light)),
        _ => None,
    }
}

/// Linear ramp from `min` to `max` around the closest sunrise or sunset.
pub fn linear_curve(event: SunEvent, seconds_from_event: f64, range: &BrightnessRange) -> f64 {
    let Some((x1, x2)) = anchors(event, range) else {
        return range.max;
    };
    let value = lerp(seconds_from_event, x1, x2, range.min, range.max);
    clamp(value, range.min, range.max)
}

/// S-curve around the closest sunrise or sunset.
///
/// Passes through 5% of the range at the dark anchor and 95% at the light
/// anchor.
pub fn tanh_curve(event: SunEvent, seconds_from_event: f64, range: &BrightnessRange) -> f64 {
    let Some((x1, x2)) = anchors(event, range) else {
        return range.max;
    };
    let value = scaled_tanh(
        seconds_from_event,
        x1,
        x2,
        TANH_DARK_FRACTION,
        TANH_LIGHT_FRACTION,
        range.min,
        range.max,
    );
    clamp(value, range.min, range.max)
}

/// `tanh` scaled so that `x1` lands on fraction `y1` and `x2` on fraction `y2`
/// of `[y_min, y_max]`.
pub fn scaled_tanh(x: f64, x1: f64, x2: f64, y1: f64, y2: f64, y_min: f64, y_max: f64) -> f64 {
    let a = ((2.0 * y2 - 1.0).atanh() - (2.0 * y1 - 1.0).atanh()) / (x2 - x1);
    let b = x1 - (2.0 * y1 - 1.0).atanh() / a;
    y_min + (y_max - y_min) * 0.5 * ((a * (x - b)).tanh() + 1.0)
}

/// Linear map of an illuminance reading onto `[min, max]`.
pub fn lux_curve(lux: f64, lux_min: f64, lux_max: f64, range: &BrightnessRange) -> f64 {
    clamp(
        lerp(lux, lux_min, lux_max, range.min, range.max),
        range.min,
        range.max,
    )
}
