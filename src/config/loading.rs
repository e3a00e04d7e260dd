//! Configuration loading functionality.
//!
//! Handles locating the configuration file, parsing it and running every
//! validation stage, including the sun-geometry check that builds each
//! switch's settings once.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::Config;
use super::validation::validate_config;
use crate::engine::SunLightSettings;

const CONFIG_FILE_NAME: &str = "adaptive-lighting.toml";
const CONFIG_DIR_NAME: &str = "adaptive-lighting";

/// Global configuration directory, set once at startup
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for the current process.
/// This can only be called once, typically at startup.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// Get the configuration file path.
///
/// A directory passed through `set_config_dir` wins; otherwise the platform
/// config directory (`$XDG_CONFIG_HOME` on Linux) is used.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = CONFIG_DIR.get().and_then(|d| d.clone()) {
        return Ok(custom_dir.join(CONFIG_FILE_NAME));
    }

    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load configuration using automatic path detection.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        anyhow::bail!(
            "No configuration found at {}. Create it or pass --config <path>",
            config_path.display()
        );
    }

    load_from_path(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))
}

/// Load configuration from a specific path.
pub fn load_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    load_from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
}

/// Parse and validate configuration text.
///
/// Sun geometry is checked against the current date; see
/// [`validate_sun_geometry`] to check a specific instant.
pub fn load_from_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse configuration")?;

    validate_config(&config)?;
    validate_sun_geometry(&config, Utc::now())?;

    Ok(config)
}

/// Build every switch's settings and evaluate its sun events at `at`.
///
/// An impossible sunrise/noon/sunset/midnight order is a fatal configuration
/// error, so it is surfaced here rather than on the first adaptation.
pub fn validate_sun_geometry(config: &Config, at: DateTime<Utc>) -> Result<()> {
    for switch in &config.switches {
        let settings = SunLightSettings::from_config(&config.location, switch)
            .with_context(|| format!("Switch '{}' has invalid settings", switch.name))?;
        settings
            .sun
            .sun_events(at)
            .with_context(|| format!("Switch '{}' has impossible sun geometry", switch.name))?;
        if let Some(color_sun) = &settings.color_sun {
            color_sun.sun_events(at).with_context(|| {
                format!(
                    "Switch '{}' has impossible color sun geometry",
                    switch.name
                )
            })?;
        }
    }
    Ok(())
}
