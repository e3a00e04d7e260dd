//! Interpolation engine: target brightness and color for an instant.
//!
//! [`SunLightSettings`] bundles everything needed to answer "what should the
//! lights of this switch look like at time `t`". It is built once from a
//! switch configuration and rebuilt when the settings change.
//!
//! ## Module Structure
//!
//! - [`brightness`]: default, linear, tanh and lux brightness curves
//! - [`color`]: color temperature curve and RGB/XY/HS conversions
//! - [`schedule`]: manual schedules on the 24-hour clock

pub mod brightness;
pub mod color;
pub mod schedule;


use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};

use crate::common::utils::transition_duration;
use crate::config::{BrightnessMode, LocationConfig, SleepColorMode, SwitchConfig};
use crate::geo::{Location, SunEvents};
use brightness::BrightnessRange;
use schedule::Schedule;

/// Target attributes for one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct LightSettings {
    pub brightness_pct: f64,
    pub color_temp_kelvin: u32,
    pub rgb_color: [u8; 3],
    pub xy_color: (f64, f64),
    pub hs_color: (f64, f64),
    pub sun_position: f64,
    /// Sleep mode asks for an RGB color even on color-temperature lights
    pub force_rgb_color: bool,
}

/// Where the color temperature comes from.
#[derive(Debug, Clone, PartialEq)]
enum ColorTrack {
    /// The main sun position (or the manual schedule in manual mode)
    Main,
    /// An independent set of sun events
    Sun(SunEvents),
    /// An independent color schedule
    Schedule(Schedule),
}

/// Everything needed to compute a switch's targets.
#[derive(Debug, Clone, PartialEq)]
pub struct SunLightSettings {
    pub name: String,
    pub sun: SunEvents,
    /// Independent sun track for color, when configured
    pub color_sun: Option<SunEvents>,
    pub brightness_mode: BrightnessMode,
    pub brightness: BrightnessRange,
    pub lux_min: f64,
    pub lux_max: f64,
    pub min_color_temp: u32,
    pub max_color_temp: u32,
    pub prefer_rgb_color: bool,
    pub sleep_brightness: f64,
    pub sleep_rgb_or_color_temp: SleepColorMode,
    pub sleep_color_temp: u32,
    pub sleep_rgb_color: [u8; 3],
    pub transition_until_sleep: bool,
    pub schedule: Option<Schedule>,
    color_track: ColorTrack,
}

impl SunLightSettings {
    pub fn from_config(location: &LocationConfig, switch: &SwitchConfig) -> Result<Self> {
        let location = Location::from_config(location)?;
        let sun = SunEvents::new(switch.name.clone(), location, switch.sun.clone());
        let color_sun = switch
            .color_sun
            .as_ref()
            .map(|o| SunEvents::new(format!("{} (color)", switch.name), location, o.clone()));

        let schedule = if switch.schedule.is_empty() {
            None
        } else {
            Some(Schedule::from_config(&switch.schedule).context("Invalid schedule")?)
        };

        let color_track = if !switch.color_schedule.is_empty() {
            ColorTrack::Schedule(
                Schedule::from_color_config(&switch.color_schedule)
                    .context("Invalid color_schedule")?,
            )
        } else if let Some(color_sun) = &color_sun {
            ColorTrack::Sun(color_sun.clone())
        } else {
            ColorTrack::Main
        };

        if switch.brightness_mode == BrightnessMode::Manual && schedule.is_none() {
            anyhow::bail!("brightness_mode 'manual' requires a schedule");
        }

        Ok(Self {
            name: switch.name.clone(),
            sun,
            color_sun,
            brightness_mode: switch.brightness_mode,
            brightness: BrightnessRange {
                min: switch.min_brightness,
                max: switch.max_brightness,
                time_dark: switch.brightness_mode_time_dark as f64,
                time_light: switch.brightness_mode_time_light as f64,
            },
            lux_min: switch.lux_min,
            lux_max: switch.lux_max,
            min_color_temp: switch.min_color_temp,
            max_color_temp: switch.max_color_temp,
            prefer_rgb_color: switch.prefer_rgb_color,
            sleep_brightness: switch.sleep_brightness,
            sleep_rgb_or_color_temp: switch.sleep_rgb_or_color_temp,
            sleep_color_temp: switch.sleep_color_temp,
            sleep_rgb_color: switch.sleep_rgb_color,
            transition_until_sleep: switch.transition_until_sleep,
            schedule,
            color_track,
        })
    }

    /// Targets at `at + transition`, so a light lands on the right value once
    /// its transition completes.
    pub fn compute_settings(
        &self,
        at: DateTime<Utc>,
        is_sleep: bool,
        transition: f64,
    ) -> Result<LightSettings> {
        self.compute_settings_with(at, is_sleep, transition, None)
    }

    /// Like [`compute_settings`](Self::compute_settings) with an illuminance
    /// reading for lux mode.
    pub fn compute_settings_with(
        &self,
        at: DateTime<Utc>,
        is_sleep: bool,
        transition: f64,
        illuminance: Option<f64>,
    ) -> Result<LightSettings> {
        let ahead = transition_duration(transition).as_millis();
        let at = at + Duration::milliseconds(i64::try_from(ahead)?);
        let sun_position = self.sun.sun_position(at)?;
        let color_position = match &self.color_track {
            ColorTrack::Sun(color_sun) => color_sun.sun_position(at)?,
            _ => sun_position,
        };

        let (brightness_pct, color_temp_kelvin) = if is_sleep {
            (self.sleep_brightness, self.sleep_color_temp)
        } else {
            (
                self.brightness_pct(at, sun_position, illuminance)?,
                self.color_temp_kelvin(at, color_position),
            )
        };

        let mut force_rgb_color = false;
        let rgb_color = if is_sleep && self.sleep_rgb_or_color_temp == SleepColorMode::RgbColor {
            force_rgb_color = true;
            self.sleep_rgb_color
        } else if !is_sleep
            && self.prefer_rgb_color
            && self.transition_until_sleep
            && color_position < 0.0
        {
            color::lerp_color_hsv(
                color::kelvin_to_rgb(f64::from(self.min_color_temp)),
                self.sleep_rgb_color,
                color_position.abs(),
            )
        } else {
            color::kelvin_to_rgb(f64::from(color_temp_kelvin))
        };

        // Hue and saturation come from the chromaticity at full brightness
        let xy_color = color::rgb_to_xy(rgb_color);
        let hs_color = color::rgb_to_hs(color::xy_to_rgb(xy_color));

        Ok(LightSettings {
            brightness_pct,
            color_temp_kelvin,
            rgb_color,
            xy_color,
            hs_color,
            sun_position,
            force_rgb_color,
        })
    }

    fn brightness_pct(
        &self,
        at: DateTime<Utc>,
        sun_position: f64,
        illuminance: Option<f64>,
    ) -> Result<f64> {
        let range = &self.brightness;
        let value = match self.brightness_mode {
            BrightnessMode::Default => brightness::default_curve(sun_position, range),
            BrightnessMode::Linear | BrightnessMode::Tanh => {
                let (event, event_at) = self.sun.closest_event(at)?;
                let offset = (at - event_at).num_milliseconds() as f64 / 1000.0;
                if self.brightness_mode == BrightnessMode::Linear {
                    brightness::linear_curve(event, offset, range)
                } else {
                    brightness::tanh_curve(event, offset, range)
                }
            }
            BrightnessMode::Lux => match illuminance {
                Some(lux) => brightness::lux_curve(lux, self.lux_min, self.lux_max, range),
                None => brightness::default_curve(sun_position, range),
            },
            BrightnessMode::Manual => match &self.schedule {
                Some(schedule) => schedule.at(self.local_time(at)).brightness_pct,
                None => brightness::default_curve(sun_position, range),
            },
        };
        Ok(value)
    }

    fn color_temp_kelvin(&self, at: DateTime<Utc>, color_position: f64) -> u32 {
        match (&self.color_track, &self.schedule) {
            (ColorTrack::Schedule(colors), _) => colors.at(self.local_time(at)).color_temp,
            (ColorTrack::Main, Some(schedule)) if self.brightness_mode == BrightnessMode::Manual => {
                schedule.at(self.local_time(at)).color_temp
            }
            _ => color::color_temp_from_position(
                color_position,
                self.min_color_temp,
                self.max_color_temp,
                self.sleep_color_temp,
                self.transition_until_sleep,
            ),
        }
    }

    fn local_time(&self, at: DateTime<Utc>) -> chrono::NaiveTime {
        at.with_timezone(&self.sun.timezone()).time()
    }
}
