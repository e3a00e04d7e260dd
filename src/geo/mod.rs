//! Geographic sun geometry.
//!
//! ## Module Structure
//!
//! - [`solar`]: astronomical sunrise/sunset (via the `sunrise` crate) and the
//!   NOAA solar-noon transit
//! - [`sun_events`]: sunrise, noon, sunset and midnight with configured
//!   overrides, sun position and event lookups
//! - [`display`]: debug output of a day's sun events

pub mod display;
pub mod solar;
pub mod sun_events;

pub use display::log_sun_events;
pub use sun_events::{SunEvent, SunEvents};


use anyhow::Result;
use chrono_tz::Tz;

use crate::config::LocationConfig;

/// Observer position used for the astronomical calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Geographic latitude in degrees (-90 to +90)
    pub latitude: f64,
    /// Geographic longitude in degrees (-180 to +180)
    pub longitude: f64,
    /// Observer elevation in meters
    pub elevation: f64,
    /// Timezone used to interpret dates and override times
    pub timezone: Tz,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, elevation: f64, timezone: Tz) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
            timezone,
        }
    }

    pub fn from_config(config: &LocationConfig) -> Result<Self> {
        Ok(Self::new(
            config.latitude,
            config.longitude,
            config.elevation,
            crate::config::resolve_timezone(config)?,
        ))
    }
}
