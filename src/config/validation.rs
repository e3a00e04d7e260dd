//! Configuration validation functionality.
//!
//! Rejects out-of-range values and contradictory settings before any switch is
//! built. Sun-event ordering is checked separately in `loading`, because it
//! depends on the date.

use anyhow::Result;
use std::collections::HashSet;

use super::{BrightnessMode, Config, SunOverrides, SwitchConfig};
use crate::common::constants::*;

/// Comprehensive configuration validation to prevent impossible setups
pub fn validate_config(config: &Config) -> Result<()> {
    let location = &config.location;

    if !(-90.0..=90.0).contains(&location.latitude) {
        anyhow::bail!(
            "latitude must be between -90 and 90 degrees (got {})",
            location.latitude
        );
    }

    if !(-180.0..=180.0).contains(&location.longitude) {
        anyhow::bail!(
            "longitude must be between -180 and 180 degrees (got {})",
            location.longitude
        );
    }

    super::resolve_timezone(location)?;

    let mut names = HashSet::new();
    for switch in &config.switches {
        if switch.name.trim().is_empty() {
            anyhow::bail!("Every [[switch]] needs a non-empty name");
        }
        if !names.insert(switch.name.as_str()) {
            anyhow::bail!("Duplicate switch name '{}'", switch.name);
        }
        validate_switch(switch)
            .map_err(|e| anyhow::anyhow!("Switch '{}': {}", switch.name, e))?;
    }

    Ok(())
}

/// Validate a single switch configuration.
pub fn validate_switch(switch: &SwitchConfig) -> Result<()> {
    validate_brightness("min_brightness", switch.min_brightness)?;
    validate_brightness("max_brightness", switch.max_brightness)?;
    validate_brightness("sleep_brightness", switch.sleep_brightness)?;
    if switch.min_brightness > switch.max_brightness {
        anyhow::bail!(
            "min_brightness ({}%) must not exceed max_brightness ({}%)",
            switch.min_brightness,
            switch.max_brightness
        );
    }

    validate_color_temp("min_color_temp", switch.min_color_temp)?;
    validate_color_temp("max_color_temp", switch.max_color_temp)?;
    validate_color_temp("sleep_color_temp", switch.sleep_color_temp)?;
    if switch.min_color_temp > switch.max_color_temp {
        anyhow::bail!(
            "min_color_temp ({}K) must not exceed max_color_temp ({}K)",
            switch.min_color_temp,
            switch.max_color_temp
        );
    }

    if switch.brightness_mode_time_dark < 0 || switch.brightness_mode_time_light < 0 {
        anyhow::bail!("brightness_mode_time_dark and brightness_mode_time_light must be >= 0");
    }
    if matches!(
        switch.brightness_mode,
        BrightnessMode::Linear | BrightnessMode::Tanh
    ) && switch.brightness_mode_time_dark + switch.brightness_mode_time_light == 0
    {
        anyhow::bail!(
            "brightness_mode '{}' needs a non-zero brightness_mode_time_dark or brightness_mode_time_light",
            switch.brightness_mode.as_str()
        );
    }

    if switch.lux_min >= switch.lux_max {
        anyhow::bail!(
            "lux_min ({}) must be smaller than lux_max ({})",
            switch.lux_min,
            switch.lux_max
        );
    }

    validate_sun_overrides(&switch.sun)?;
    if let Some(color_sun) = &switch.color_sun {
        validate_sun_overrides(color_sun)?;
    }

    if switch.brightness_mode == BrightnessMode::Manual && switch.schedule.is_empty() {
        anyhow::bail!("brightness_mode 'manual' requires at least one [[switch.schedule]] point");
    }

    let mut times = HashSet::new();
    for point in &switch.schedule {
        if !times.insert(point.time) {
            anyhow::bail!("Duplicate schedule time {}", point.time);
        }
        if !(0.0..=MAXIMUM_BRIGHTNESS).contains(&point.brightness_pct) {
            anyhow::bail!(
                "schedule brightness_pct ({}) at {} must be between 0 and {}",
                point.brightness_pct,
                point.time,
                MAXIMUM_BRIGHTNESS
            );
        }
        validate_color_temp("schedule color_temp", point.color_temp)?;
    }

    let mut color_times = HashSet::new();
    for point in &switch.color_schedule {
        if !color_times.insert(point.time) {
            anyhow::bail!("Duplicate color_schedule time {}", point.time);
        }
        validate_color_temp("color_schedule color_temp", point.color_temp)?;
    }

    if !(MINIMUM_INTERVAL..=MAXIMUM_INTERVAL).contains(&switch.interval) {
        anyhow::bail!(
            "interval ({}s) must be between {} and {} seconds",
            switch.interval,
            MINIMUM_INTERVAL,
            MAXIMUM_INTERVAL
        );
    }

    for (field, value) in [
        ("transition", switch.transition),
        ("initial_transition", switch.initial_transition),
        ("sleep_transition", switch.sleep_transition),
    ] {
        if !(0.0..=MAXIMUM_TRANSITION).contains(&value) {
            anyhow::bail!(
                "{} ({}s) must be between 0 and {} seconds",
                field,
                value,
                MAXIMUM_TRANSITION
            );
        }
    }

    if switch.send_split_delay > MAXIMUM_SEND_SPLIT_DELAY_MS {
        anyhow::bail!(
            "send_split_delay ({}ms) must not exceed {}ms",
            switch.send_split_delay,
            MAXIMUM_SEND_SPLIT_DELAY_MS
        );
    }

    if switch.autoreset_control_seconds > MAXIMUM_AUTORESET_CONTROL_SECONDS {
        anyhow::bail!(
            "autoreset_control_seconds ({}) must not exceed {}",
            switch.autoreset_control_seconds,
            MAXIMUM_AUTORESET_CONTROL_SECONDS
        );
    }

    if switch.adapt_delay < 0.0 || switch.turn_off_delay < 0.0 {
        anyhow::bail!("adapt_delay and turn_off_delay must be >= 0");
    }

    if !(1..=MAXIMUM_TURN_OFF_RETRIES).contains(&switch.turn_off_retries) {
        anyhow::bail!(
            "turn_off_retries ({}) must be between 1 and {}",
            switch.turn_off_retries,
            MAXIMUM_TURN_OFF_RETRIES
        );
    }

    Ok(())
}

fn validate_brightness(field: &str, value: f64) -> Result<()> {
    if !(MINIMUM_BRIGHTNESS..=MAXIMUM_BRIGHTNESS).contains(&value) {
        anyhow::bail!(
            "{} ({}%) must be between {}% and {}%",
            field,
            value,
            MINIMUM_BRIGHTNESS,
            MAXIMUM_BRIGHTNESS
        );
    }
    Ok(())
}

fn validate_color_temp(field: &str, value: u32) -> Result<()> {
    if !(MINIMUM_COLOR_TEMP..=MAXIMUM_COLOR_TEMP).contains(&value) {
        anyhow::bail!(
            "{} ({}) must be between {} and {} Kelvin",
            field,
            value,
            MINIMUM_COLOR_TEMP,
            MAXIMUM_COLOR_TEMP
        );
    }
    Ok(())
}

fn validate_sun_overrides(sun: &SunOverrides) -> Result<()> {
    if let (Some(min), Some(max)) = (sun.min_sunrise_time, sun.max_sunrise_time)
        && min > max
    {
        anyhow::bail!("min_sunrise_time ({min}) must not be after max_sunrise_time ({max})");
    }
    if let (Some(min), Some(max)) = (sun.min_sunset_time, sun.max_sunset_time)
        && min > max
    {
        anyhow::bail!("min_sunset_time ({min}) must not be after max_sunset_time ({max})");
    }
    const DAY: i64 = 86400;
    if sun.sunrise_offset.abs() >= DAY || sun.sunset_offset.abs() >= DAY {
        anyhow::bail!("sunrise_offset and sunset_offset must be shorter than a day");
    }
    Ok(())
}
