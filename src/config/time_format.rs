//! Time-of-day parsing for configuration fields.
//!
//! Accepts `HH:MM:SS` and the shorter `HH:MM`.

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer};

/// Parse a time of day in `HH:MM:SS` or `HH:MM` form.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| format!("invalid time '{value}', expected HH:MM or HH:MM:SS"))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_time_of_day(&raw).map_err(serde::de::Error::custom)
}

pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|value| parse_time_of_day(&value).map_err(serde::de::Error::custom))
        .transpose()
}
