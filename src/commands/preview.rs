//! Implementation of the `preview` command.
//!
//! Loads the configuration, then walks a pinned clock through one local day
//! and prints the sun events and computed settings of every switch. Nothing
//! is sent to any light.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use std::path::Path;

use crate::adapt::ServiceData;
use crate::config::{self, Config, SwitchConfig};
use crate::engine::SunLightSettings;
use crate::geo::{log_sun_events, sun_events::localize};
use crate::time_source::{SimulatedTimeSource, TimeSource};

/// Options of one preview run.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewOptions {
    pub config_path: Option<String>,
    pub date: Option<NaiveDate>,
    pub step_minutes: u32,
    pub sleep: bool,
}

/// One printed row of a preview.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRow {
    pub local_time: NaiveTime,
    pub sun_position: f64,
    pub brightness_pct: f64,
    pub color_temp_kelvin: u32,
    pub rgb_color: [u8; 3],
}

/// Handle the `preview` command.
pub fn run_preview_command(options: PreviewOptions) -> Result<()> {
    log_version!();

    let config = load_config(options.config_path.as_deref())?;
    config.log_config();
    if config.switches.is_empty() {
        log_warning!("No [[switch]] tables configured, nothing to preview");
        log_end!();
        return Ok(());
    }

    let tz = config.location.tz()?;
    let date = options
        .date
        .unwrap_or_else(|| Utc::now().with_timezone(&tz).date_naive());

    for switch in &config.switches {
        let rows = preview_switch(&config, switch, date, options.step_minutes, options.sleep)?;
        log_block_start!(
            "Switch '{}' ({} light(s)){}",
            switch.name,
            switch.lights.len(),
            if options.sleep { ", sleep mode" } else { "" }
        );
        log_indented!("Time      Position  Bright   Kelvin  RGB");
        for row in rows {
            log_indented!(
                "{}  {:>+7.3}  {:>5.1}%  {:>6}K  {:?}",
                row.local_time.format("%H:%M"),
                row.sun_position,
                row.brightness_pct,
                row.color_temp_kelvin,
                row.rgb_color
            );
            let payload = ServiceData {
                brightness_pct: Some(row.brightness_pct.round()),
                color_temp_kelvin: Some(row.color_temp_kelvin),
                ..ServiceData::for_lights(&switch.lights)
            };
            log_debug!("turn_on {}", payload.to_json());
        }
    }

    log_end!();
    Ok(())
}

/// Compute the rows of one switch for `date` without printing them.
///
/// Sun events are logged before the rows. Steps run from local midnight
/// until the next local date begins.
pub fn preview_switch(
    config: &Config,
    switch: &SwitchConfig,
    date: NaiveDate,
    step_minutes: u32,
    sleep: bool,
) -> Result<Vec<PreviewRow>> {
    let settings = SunLightSettings::from_config(&config.location, switch)
        .with_context(|| format!("Switch '{}' has invalid settings", switch.name))?;
    log_sun_events(&settings.sun, date)?;

    let tz = settings.sun.timezone();
    let step = Duration::minutes(i64::from(step_minutes.max(1)));
    let clock = SimulatedTimeSource::new(localize(tz, date, NaiveTime::MIN)?);

    let mut rows = Vec::new();
    while clock.now().with_timezone(&tz).date_naive() == date {
        let now = clock.now();
        let computed = settings.compute_settings(now, sleep, 0.0)?;
        rows.push(PreviewRow {
            local_time: now.with_timezone(&tz).time(),
            sun_position: computed.sun_position,
            brightness_pct: computed.brightness_pct,
            color_temp_kelvin: computed.color_temp_kelvin,
            rgb_color: computed.rgb_color,
        });
        clock.advance(step);
    }
    log_debug!("Computed {} preview row(s) for '{}'", rows.len(), switch.name);
    Ok(rows)
}

/// Load from an explicit file or directory, or from the default location.
fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) if Path::new(path).is_dir() => {
            config::set_config_dir(Some(path.to_string()))?;
            Config::load()
        }
        Some(path) => Config::load_from_path(Path::new(path)),
        None => Config::load(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const CONFIG: &str = r#"
[location]
latitude = 52.379189
longitude = 4.899431
timezone = "Europe/Amsterdam"

[[switch]]
name = "living_room"
lights = ["light.desk"]
sunrise_time = "06:00:00"
sunset_time = "18:00:00"
"#;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 21).unwrap()
    }

    #[test]
    fn test_preview_rows_cover_the_local_day() {
        let config = config::load_from_str(CONFIG).unwrap();
        let rows = preview_switch(&config, &config.switches[0], date(), 60, false).unwrap();

        assert_eq!(rows.len(), 24);
        assert_eq!(rows[0].local_time, NaiveTime::MIN);
        assert_eq!(rows[23].local_time, NaiveTime::from_hms_opt(23, 0, 0).unwrap());
    }

    #[test]
    fn test_preview_follows_the_sun() {
        let config = config::load_from_str(CONFIG).unwrap();
        let rows = preview_switch(&config, &config.switches[0], date(), 60, false).unwrap();

        let noon = &rows[12];
        assert!(noon.sun_position > 0.9);
        assert_eq!(noon.brightness_pct, 100.0);
        assert_eq!(noon.color_temp_kelvin, 5500);

        let night = &rows[0];
        assert!(night.sun_position < 0.0);
        assert!(night.color_temp_kelvin < 5500);
    }

    #[test]
    fn test_preview_sleep_mode_uses_sleep_values() {
        let config = config::load_from_str(CONFIG).unwrap();
        let rows = preview_switch(&config, &config.switches[0], date(), 180, true).unwrap();

        assert_eq!(rows.len(), 8);
        assert!(rows.iter().all(|r| r.brightness_pct == 1.0));
        assert!(rows.iter().all(|r| r.color_temp_kelvin == 1000));
    }

    #[test]
    fn test_preview_dst_day_has_fewer_rows() {
        let config = config::load_from_str(CONFIG).unwrap();
        let spring_forward = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let rows = preview_switch(&config, &config.switches[0], spring_forward, 60, false).unwrap();

        assert_eq!(rows.len(), 23);
    }

    #[test]
    fn test_load_config_from_file_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lights.toml");
        fs::write(&path, CONFIG).unwrap();

        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.switches[0].name, "living_room");
    }

    #[test]
    fn test_load_config_missing_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(load_config(path.to_str()).is_err());
    }
}
