//! Configuration system for adaptive-lighting switches.
//!
//! A configuration file declares a shared location and one `[[switch]]` table
//! per group of lights. Every switch field is optional and falls back to the
//! defaults in `common::constants`:
//!
//! ```toml
//! [location]
//! latitude = 52.37
//! longitude = 4.89
//! elevation = 0.0
//! timezone = "Europe/Amsterdam"
//!
//! [[switch]]
//! name = "living_room"
//! lights = ["light.desk", "light.ceiling"]
//!
//! #[Brightness & color]
//! min_brightness = 1            # Percent (1-100)
//! max_brightness = 100          # Percent (1-100)
//! min_color_temp = 2000         # Kelvin (1000-10000)
//! max_color_temp = 5500         # Kelvin (1000-10000)
//! prefer_rgb_color = false      # Send rgb_color instead of color_temp
//! brightness_mode = "default"   # "default", "linear", "tanh", "lux", "manual"
//! brightness_mode_time_dark = 900
//! brightness_mode_time_light = 3600
//!
//! #[Sleep]
//! sleep_brightness = 1
//! sleep_rgb_or_color_temp = "color_temp"  # or "rgb_color"
//! sleep_color_temp = 1000
//! sleep_rgb_color = [255, 56, 0]
//! transition_until_sleep = false
//!
//! #[Sun overrides]
//! sunrise_time = "06:30"        # Fixed sunrise (HH:MM[:SS])
//! max_sunset_time = "21:00:00"  # Sunset never later than this
//! sunrise_offset = -600         # Seconds, may be negative
//!
//! #[Manual control]
//! take_over_control = true
//! detect_non_ha_changes = false
//! autoreset_control_seconds = 0 # 0 disables the auto-reset timer
//!
//! #[Commands]
//! interval = 90                 # Seconds between periodic adaptations
//! transition = 45               # Seconds
//! separate_turn_on_commands = false
//! send_split_delay = 0          # Milliseconds between split commands
//! skip_redundant_commands = false
//! intercept = true
//! ```
//!
//! A manual schedule is given as an array of tables:
//!
//! ```toml
//! [[switch.schedule]]
//! time = "07:00"
//! brightness_pct = 60
//! color_temp = 3000
//! ```

pub mod loading;
pub mod time_format;
pub mod validation;


use anyhow::{Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;

use crate::common::constants::*;

pub use loading::{get_config_path, load, load_from_path, load_from_str, set_config_dir};

/// Root of a configuration file.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Geographic location shared by every switch.
    #[serde(default)]
    pub location: LocationConfig,

    /// One entry per group of lights.
    #[serde(rename = "switch", default)]
    pub switches: Vec<SwitchConfig>,
}

/// Geographic location used for the astronomical sun calculation.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LocationConfig {
    /// Geographic latitude in degrees (-90 to +90)
    pub latitude: f64,
    /// Geographic longitude in degrees (-180 to +180)
    pub longitude: f64,
    /// Observer elevation in meters
    pub elevation: f64,
    /// IANA timezone name, used to combine override times with dates
    pub timezone: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            elevation: 0.0,
            timezone: "UTC".to_string(),
        }
    }
}

impl LocationConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Unknown timezone '{}': {}", self.timezone, e))
    }
}

/// How brightness is derived.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrightnessMode {
    /// Full brightness during the day, ramps down with the sun at night.
    #[default]
    Default,
    /// Linear ramp around the closest sunrise/sunset.
    Linear,
    /// Hyperbolic-tangent S-curve around the closest sunrise/sunset.
    Tanh,
    /// Driven by an illuminance sensor reading.
    Lux,
    /// Interpolated from the manual schedule.
    Manual,
}

impl BrightnessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrightnessMode::Default => "default",
            BrightnessMode::Linear => "linear",
            BrightnessMode::Tanh => "tanh",
            BrightnessMode::Lux => "lux",
            BrightnessMode::Manual => "manual",
        }
    }
}

/// Which color attribute sleep mode sends.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SleepColorMode {
    #[default]
    ColorTemp,
    RgbColor,
}

/// Sunrise/sunset overrides. Used for the main track and, optionally, for an
/// independent color track.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct SunOverrides {
    #[serde(deserialize_with = "time_format::deserialize_optional")]
    pub sunrise_time: Option<NaiveTime>,
    #[serde(deserialize_with = "time_format::deserialize_optional")]
    pub min_sunrise_time: Option<NaiveTime>,
    #[serde(deserialize_with = "time_format::deserialize_optional")]
    pub max_sunrise_time: Option<NaiveTime>,
    /// Seconds added to sunrise, may be negative
    pub sunrise_offset: i64,
    #[serde(deserialize_with = "time_format::deserialize_optional")]
    pub sunset_time: Option<NaiveTime>,
    #[serde(deserialize_with = "time_format::deserialize_optional")]
    pub min_sunset_time: Option<NaiveTime>,
    #[serde(deserialize_with = "time_format::deserialize_optional")]
    pub max_sunset_time: Option<NaiveTime>,
    /// Seconds added to sunset, may be negative
    pub sunset_offset: i64,
}

impl SunOverrides {
    /// True when any fixed time or clamp is configured. Offsets alone don't count.
    pub fn has_time_overrides(&self) -> bool {
        self.sunrise_time.is_some()
            || self.sunset_time.is_some()
            || self.min_sunrise_time.is_some()
            || self.max_sunrise_time.is_some()
            || self.min_sunset_time.is_some()
            || self.max_sunset_time.is_some()
    }
}

/// One point of a manual brightness/color schedule.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SchedulePointConfig {
    #[serde(deserialize_with = "time_format::deserialize")]
    pub time: NaiveTime,
    pub brightness_pct: f64,
    pub color_temp: u32,
}

/// One point of an independent color schedule.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ColorSchedulePointConfig {
    #[serde(deserialize_with = "time_format::deserialize")]
    pub time: NaiveTime,
    pub color_temp: u32,
}

/// Settings of a single switch (group of lights).
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SwitchConfig {
    pub name: String,
    pub lights: Vec<String>,

    pub min_brightness: f64,
    pub max_brightness: f64,
    pub min_color_temp: u32,
    pub max_color_temp: u32,
    pub prefer_rgb_color: bool,

    pub sleep_brightness: f64,
    pub sleep_rgb_or_color_temp: SleepColorMode,
    pub sleep_color_temp: u32,
    pub sleep_rgb_color: [u8; 3],
    pub transition_until_sleep: bool,

    pub brightness_mode: BrightnessMode,
    /// Seconds before sunrise / after sunset where the ramp is dark
    pub brightness_mode_time_dark: i64,
    /// Seconds after sunrise / before sunset where the ramp is light
    pub brightness_mode_time_light: i64,
    pub lux_min: f64,
    pub lux_max: f64,

    #[serde(flatten)]
    pub sun: SunOverrides,
    /// Independent sun track for color temperature.
    pub color_sun: Option<SunOverrides>,

    pub schedule: Vec<SchedulePointConfig>,
    pub color_schedule: Vec<ColorSchedulePointConfig>,

    /// Seconds between periodic adaptations
    pub interval: u64,
    /// Seconds, used by the periodic adaptation
    pub transition: f64,
    /// Seconds, used when a light turns on
    pub initial_transition: f64,
    /// Seconds, used when sleep mode toggles
    pub sleep_transition: f64,

    pub take_over_control: bool,
    pub detect_non_ha_changes: bool,
    pub autoreset_control_seconds: u64,
    pub only_once: bool,
    pub adapt_only_on_bare_turn_on: bool,

    pub separate_turn_on_commands: bool,
    /// Milliseconds added between split commands
    pub send_split_delay: u64,
    pub skip_redundant_commands: bool,
    /// Seconds to wait after a light turns on before adapting it
    pub adapt_delay: f64,
    pub intercept: bool,
    pub multi_light_intercept: bool,

    /// Seconds the "just turned off" guard waits without a known transition
    pub turn_off_delay: f64,
    /// Number of re-checks the "just turned off" guard performs
    pub turn_off_retries: u32,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            lights: Vec::new(),
            min_brightness: DEFAULT_MIN_BRIGHTNESS,
            max_brightness: DEFAULT_MAX_BRIGHTNESS,
            min_color_temp: DEFAULT_MIN_COLOR_TEMP,
            max_color_temp: DEFAULT_MAX_COLOR_TEMP,
            prefer_rgb_color: false,
            sleep_brightness: DEFAULT_SLEEP_BRIGHTNESS,
            sleep_rgb_or_color_temp: SleepColorMode::ColorTemp,
            sleep_color_temp: DEFAULT_SLEEP_COLOR_TEMP,
            sleep_rgb_color: DEFAULT_SLEEP_RGB_COLOR,
            transition_until_sleep: false,
            brightness_mode: BrightnessMode::Default,
            brightness_mode_time_dark: DEFAULT_BRIGHTNESS_MODE_TIME_DARK,
            brightness_mode_time_light: DEFAULT_BRIGHTNESS_MODE_TIME_LIGHT,
            lux_min: DEFAULT_LUX_MIN,
            lux_max: DEFAULT_LUX_MAX,
            sun: SunOverrides::default(),
            color_sun: None,
            schedule: Vec::new(),
            color_schedule: Vec::new(),
            interval: DEFAULT_INTERVAL,
            transition: DEFAULT_TRANSITION,
            initial_transition: DEFAULT_INITIAL_TRANSITION,
            sleep_transition: DEFAULT_SLEEP_TRANSITION,
            take_over_control: true,
            detect_non_ha_changes: false,
            autoreset_control_seconds: DEFAULT_AUTORESET_CONTROL_SECONDS,
            only_once: false,
            adapt_only_on_bare_turn_on: false,
            separate_turn_on_commands: false,
            send_split_delay: DEFAULT_SEND_SPLIT_DELAY_MS,
            skip_redundant_commands: false,
            adapt_delay: DEFAULT_ADAPT_DELAY,
            intercept: true,
            multi_light_intercept: true,
            turn_off_delay: DEFAULT_TURN_OFF_DELAY,
            turn_off_retries: DEFAULT_TURN_OFF_RETRIES,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        load()
    }

    /// Load configuration from an explicit file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        load_from_path(path)
    }

    /// Look up a switch by name.
    pub fn switch(&self, name: &str) -> Option<&SwitchConfig> {
        self.switches.iter().find(|s| s.name == name)
    }

    /// Print a short summary of the loaded configuration.
    pub fn log_config(&self) {
        log_block_start!(
            "Location: {:.4}°, {:.4}° ({})",
            self.location.latitude,
            self.location.longitude,
            self.location.timezone
        );
        for switch in &self.switches {
            switch.log_config();
        }
    }
}

impl SwitchConfig {
    /// Whether any source of sun geometry differs from pure astronomy.
    pub fn uses_sun_overrides(&self) -> bool {
        self.sun.has_time_overrides() || self.sun.sunrise_offset != 0 || self.sun.sunset_offset != 0
    }

    pub fn autoreset_duration(&self) -> Option<std::time::Duration> {
        (self.autoreset_control_seconds > 0)
            .then(|| std::time::Duration::from_secs(self.autoreset_control_seconds))
    }

    pub fn log_config(&self) {
        log_decorated!("Switch '{}' ({} lights)", self.name, self.lights.len());
        log_indented!("Brightness mode: {}", self.brightness_mode.as_str());
        log_indented!(
            "Brightness: {}% - {}%",
            self.min_brightness,
            self.max_brightness
        );
        log_indented!(
            "Color temperature: {}K - {}K",
            self.min_color_temp,
            self.max_color_temp
        );
        if self.uses_sun_overrides() {
            log_indented!("Sun overrides active");
        }
        if self.color_sun.is_some() || !self.color_schedule.is_empty() {
            log_indented!("Independent color schedule active");
        }
        log_indented!(
            "Interval: {}s, transition: {}s",
            self.interval,
            self.transition
        );
    }
}

/// Resolve the timezone of a location with context for error reporting.
pub(crate) fn resolve_timezone(location: &LocationConfig) -> Result<Tz> {
    location
        .tz()
        .with_context(|| format!("Invalid [location] timezone '{}'", location.timezone))
}
