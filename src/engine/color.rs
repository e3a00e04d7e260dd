//! Color temperature curve and color-space conversions.
//!
//! Conversions follow the usual smart-home formulas: a Planckian-locus
//! approximation for Kelvin → RGB, sRGB gamma with the Wide-RGB D65 matrix for
//! RGB ↔ CIE xy, and HSV for hue/saturation. Results are rounded so the same
//! input always yields the same command payload.

use crate::common::constants::{COLOR_TEMP_STEP, PLANCKIAN_MAX_KELVIN, PLANCKIAN_MIN_KELVIN};
use crate::common::utils::{clamp, round_to, round_to_step};

/// Color temperature for a sun position.
///
/// Rises from `min` at the horizon to `max` at noon. Below the horizon it
/// stays at `min`, or keeps falling towards `sleep` at midnight when
/// `transition_until_sleep` is set.
pub fn color_temp_from_position(
    sun_position: f64,
    min: u32,
    max: u32,
    sleep: u32,
    transition_until_sleep: bool,
) -> u32 {
    let (min, max, sleep) = (f64::from(min), f64::from(max), f64::from(sleep));
    let kelvin = if sun_position > 0.0 {
        min + (max - min) * sun_position
    } else if transition_until_sleep {
        min + (min - sleep) * sun_position
    } else {
        return min as u32;
    };
    round_to_step(kelvin, COLOR_TEMP_STEP).max(0.0) as u32
}

/// Approximate RGB of a black body at `kelvin`.
pub fn kelvin_to_rgb(kelvin: f64) -> [u8; 3] {
    let tmp = clamp(kelvin, PLANCKIAN_MIN_KELVIN, PLANCKIAN_MAX_KELVIN) / 100.0;

    let red = if tmp <= 66.0 {
        255.0
    } else {
        329.698727446 * (tmp - 60.0).powf(-0.1332047592)
    };
    let green = if tmp <= 66.0 {
        99.4708025861 * tmp.ln() - 161.1195681661
    } else {
        288.1221695283 * (tmp - 60.0).powf(-0.0755148492)
    };
    let blue = if tmp >= 66.0 {
        255.0
    } else if tmp <= 19.0 {
        0.0
    } else {
        138.5177312231 * (tmp - 10.0).ln() - 305.0447927307
    };

    [channel(red), channel(green), channel(blue)]
}

fn channel(value: f64) -> u8 {
    clamp(value, 0.0, 255.0).round() as u8
}

fn gamma_expand(c: f64) -> f64 {
    if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

fn gamma_compress(c: f64) -> f64 {
    if c <= 0.0031308 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// CIE 1931 xy chromaticity of an sRGB color, rounded to 3 decimals.
pub fn rgb_to_xy(rgb: [u8; 3]) -> (f64, f64) {
    if rgb == [0, 0, 0] {
        return (0.0, 0.0);
    }
    let [r, g, b] = rgb.map(|c| gamma_expand(f64::from(c) / 255.0));

    let x = r * 0.664511 + g * 0.154324 + b * 0.162028;
    let y = r * 0.283881 + g * 0.668433 + b * 0.047685;
    let z = r * 0.000088 + g * 0.072310 + b * 0.986039;

    let sum = x + y + z;
    if sum == 0.0 {
        return (0.0, 0.0);
    }
    (round_to(x / sum, 3), round_to(y / sum, 3))
}

/// sRGB color at full brightness for an xy chromaticity.
pub fn xy_to_rgb(xy: (f64, f64)) -> [u8; 3] {
    let (vx, vy) = xy;
    if vy == 0.0 {
        return [0, 0, 0];
    }
    let y = 1.0;
    let x = (y / vy) * vx;
    let z = (y / vy) * (1.0 - vx - vy);

    let r = x * 1.656492 - y * 0.354851 - z * 0.255038;
    let g = -x * 0.707196 + y * 1.655397 + z * 0.036152;
    let b = x * 0.051713 - y * 0.121364 + z * 1.011530;

    let mut rgb = [r, g, b].map(|c| gamma_compress(c).max(0.0));
    let peak = rgb.iter().copied().fold(0.0, f64::max);
    if peak > 1.0 {
        rgb = rgb.map(|c| c / peak);
    }
    rgb.map(|c| (c * 255.0) as u8)
}

/// Hue (degrees) and saturation (percent) of an RGB color, rounded to 3 decimals.
pub fn rgb_to_hs(rgb: [u8; 3]) -> (f64, f64) {
    let (h, s, _) = rgb_to_hsv(rgb.map(|c| f64::from(c) / 255.0));
    (round_to(h * 360.0, 3), round_to(s * 100.0, 3))
}

/// Components in `[0, 1]`.
fn rgb_to_hsv([r, g, b]: [f64; 3]) -> (f64, f64, f64) {
    let maxc = r.max(g).max(b);
    let minc = r.min(g).min(b);
    let v = maxc;
    if minc == maxc {
        return (0.0, 0.0, v);
    }
    let span = maxc - minc;
    let s = span / maxc;
    let rc = (maxc - r) / span;
    let gc = (maxc - g) / span;
    let bc = (maxc - b) / span;
    let h = if r == maxc {
        bc - gc
    } else if g == maxc {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    ((h / 6.0).rem_euclid(1.0), s, v)
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> [f64; 3] {
    if s == 0.0 {
        return [v, v, v];
    }
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

/// Blend two RGB colors in HSV space; `t = 0` is `from`, `t = 1` is `to`.
pub fn lerp_color_hsv(from: [u8; 3], to: [u8; 3], t: f64) -> [u8; 3] {
    let (h1, s1, v1) = rgb_to_hsv(from.map(|c| f64::from(c) / 255.0));
    let (h2, s2, v2) = rgb_to_hsv(to.map(|c| f64::from(c) / 255.0));
    let t = clamp(t, 0.0, 1.0);
    let mix = |a: f64, b: f64| a + (b - a) * t;
    hsv_to_rgb(mix(h1, h2), mix(s1, s2), mix(v1, v2)).map(|c| channel(c * 255.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_temp_daytime_curve() {
        assert_eq!(color_temp_from_position(1.0, 2000, 5500, 1000, false), 5500);
        assert_eq!(color_temp_from_position(0.5, 2000, 5500, 1000, false), 3750);
        // 2000 + 3500 * 0.123 = 2430.5, rounded to a multiple of 5
        assert_eq!(color_temp_from_position(0.123, 2000, 5500, 1000, false), 2430);
        assert_eq!(color_temp_from_position(0.0, 2000, 5500, 1000, false), 2000);
    }

    #[test]
    fn test_color_temp_below_horizon() {
        assert_eq!(color_temp_from_position(-0.7, 2000, 5500, 1000, false), 2000);
        assert_eq!(color_temp_from_position(-1.0, 2000, 5500, 1000, true), 1000);
        assert_eq!(color_temp_from_position(-0.5, 2000, 5500, 1000, true), 1500);
    }

    #[test]
    fn test_kelvin_to_rgb_reference_points() {
        // Warm light saturates red, cold light saturates blue
        let warm = kelvin_to_rgb(2000.0);
        assert_eq!(warm[0], 255);
        assert!(warm[2] < warm[1]);

        let neutral = kelvin_to_rgb(6600.0);
        assert_eq!(neutral, [255, 255, 255]);

        let cold = kelvin_to_rgb(10000.0);
        assert_eq!(cold[2], 255);
        assert!(cold[0] < 255);

        // Below 1900K there is no blue at all
        assert_eq!(kelvin_to_rgb(1000.0)[2], 0);
        // Out of range values are clamped
        assert_eq!(kelvin_to_rgb(500.0), kelvin_to_rgb(1000.0));
    }

    #[test]
    fn test_rgb_to_xy_white_point() {
        let (x, y) = rgb_to_xy([255, 255, 255]);
        assert!((x - 0.323).abs() < 0.002, "x = {x}");
        assert!((y - 0.329).abs() < 0.002, "y = {y}");
        assert_eq!(rgb_to_xy([0, 0, 0]), (0.0, 0.0));
    }

    #[test]
    fn test_xy_to_rgb_is_full_brightness() {
        let rgb = xy_to_rgb(rgb_to_xy([255, 120, 20]));
        assert_eq!(rgb.iter().copied().max(), Some(255));
        assert_eq!(rgb[0], 255);
        assert!(rgb[1] > rgb[2]);
        assert_eq!(xy_to_rgb((0.3, 0.0)), [0, 0, 0]);
    }

    #[test]
    fn test_rgb_to_hs() {
        assert_eq!(rgb_to_hs([255, 0, 0]), (0.0, 100.0));
        assert_eq!(rgb_to_hs([0, 255, 0]), (120.0, 100.0));
        assert_eq!(rgb_to_hs([255, 255, 255]), (0.0, 0.0));
        let (h, s) = rgb_to_hs([255, 128, 0]);
        assert!((h - 30.118).abs() < 0.001);
        assert_eq!(s, 100.0);
    }

    #[test]
    fn test_lerp_color_hsv_endpoints() {
        let from = [255, 137, 14];
        let to = [255, 56, 0];
        assert_eq!(lerp_color_hsv(from, to, 0.0), from);
        assert_eq!(lerp_color_hsv(from, to, 1.0), to);
        let mid = lerp_color_hsv(from, to, 0.5);
        assert_eq!(mid[0], 255);
        assert!(mid[1] < from[1] && mid[1] > to[1]);
    }
}
