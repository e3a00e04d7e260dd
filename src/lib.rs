//! # Adaptive Lighting Library
//!
//! Sun-driven brightness and color temperature adaptation for smart lights.
//!
//! The library is host-agnostic: everything that talks to real lights goes
//! through the [`adapt::LightHost`] trait, and everything the host observes
//! comes back in as [`adapt::Event`]s.
//!
//! ## Architecture
//!
//! - **Geographic**: `geo` computes sunrise, solar noon, sunset and solar
//!   midnight with configured overrides, and the sun position in `[-1, 1]`
//! - **Engine**: `engine` turns a sun position into target brightness and
//!   color (curves, lux mode, manual schedules, sleep mode)
//! - **Adaptation**: `adapt` builds service data for a light and splits it
//!   into ordered command groups
//! - **Manual control**: `manager` tracks takeover, auto-reset timers, the
//!   off → on guard and running adaptation tasks per light
//! - **Switches**: `switch` owns a light group, handles periodic updates and
//!   service requests, routes host events and intercepts turn_on calls
//! - **Configuration**: `config` for TOML-based settings and validation
//! - **Commands**: `commands` for CLI subcommands (preview)
//! - **Infrastructure**: logging, constants and shared math in `common`,
//!   wall-clock abstraction in `time_source`

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod common;

// Public API modules
pub mod adapt;
pub mod args;
pub mod commands;
pub mod config;
pub mod engine;
pub mod geo;
pub mod manager;
pub mod switch;
pub mod time_source;
