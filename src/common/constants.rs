//! Application-wide constants and default values.
//!
//! Defaults here are used when a field is missing from a switch configuration.
//! Limits are enforced by `config::validation`.

// # Integration identity

/// Tag embedded in every context id created by this crate.
pub const INTEGRATION_TAG: &str = "al";

/// Fixed width of a serialized context id at the host boundary.
pub const CONTEXT_ID_WIDTH: usize = 26;

// # Brightness defaults (percent)

pub const DEFAULT_MIN_BRIGHTNESS: f64 = 1.0;
pub const DEFAULT_MAX_BRIGHTNESS: f64 = 100.0;
pub const DEFAULT_SLEEP_BRIGHTNESS: f64 = 1.0;

pub const MINIMUM_BRIGHTNESS: f64 = 1.0;
pub const MAXIMUM_BRIGHTNESS: f64 = 100.0;

// # Color temperature defaults (Kelvin)

pub const DEFAULT_MIN_COLOR_TEMP: u32 = 2000;
pub const DEFAULT_MAX_COLOR_TEMP: u32 = 5500;
pub const DEFAULT_SLEEP_COLOR_TEMP: u32 = 1000;
pub const DEFAULT_SLEEP_RGB_COLOR: [u8; 3] = [255, 56, 0];

pub const MINIMUM_COLOR_TEMP: u32 = 1000;
pub const MAXIMUM_COLOR_TEMP: u32 = 10000;

/// Color temperatures handed to the Planckian approximation are clamped to this range.
pub const PLANCKIAN_MIN_KELVIN: f64 = 1000.0;
pub const PLANCKIAN_MAX_KELVIN: f64 = 40000.0;

/// Color temperatures are rounded to a multiple of this many Kelvin.
pub const COLOR_TEMP_STEP: f64 = 5.0;

// # Brightness mode timing (seconds)

pub const DEFAULT_BRIGHTNESS_MODE_TIME_DARK: i64 = 900;
pub const DEFAULT_BRIGHTNESS_MODE_TIME_LIGHT: i64 = 3600;

/// Calibration points for the tanh brightness curve.
pub const TANH_DARK_FRACTION: f64 = 0.05;
pub const TANH_LIGHT_FRACTION: f64 = 0.95;

// # Lux mode defaults

pub const DEFAULT_LUX_MIN: f64 = 0.0;
pub const DEFAULT_LUX_MAX: f64 = 10000.0;

// # Timing defaults (seconds unless noted)

pub const DEFAULT_INTERVAL: u64 = 90;
pub const MINIMUM_INTERVAL: u64 = 1;
pub const MAXIMUM_INTERVAL: u64 = 86400;
pub const DEFAULT_TRANSITION: f64 = 45.0;
pub const DEFAULT_INITIAL_TRANSITION: f64 = 1.0;
pub const DEFAULT_SLEEP_TRANSITION: f64 = 1.0;
pub const MAXIMUM_TRANSITION: f64 = 6553.0;
pub const DEFAULT_SEND_SPLIT_DELAY_MS: u64 = 0;
pub const MAXIMUM_SEND_SPLIT_DELAY_MS: u64 = 10_000;
pub const DEFAULT_ADAPT_DELAY: f64 = 0.0;
pub const DEFAULT_AUTORESET_CONTROL_SECONDS: u64 = 0;
pub const MAXIMUM_AUTORESET_CONTROL_SECONDS: u64 = 365 * 86400;

/// Fallback wait of the "just turned off" guard when no turn-off transition is known.
pub const DEFAULT_TURN_OFF_DELAY: f64 = 5.0;
/// Number of re-checks performed by the "just turned off" guard.
pub const DEFAULT_TURN_OFF_RETRIES: u32 = 3;
pub const MAXIMUM_TURN_OFF_RETRIES: u32 = 20;

// # Significant change thresholds

/// Brightness delta (0-255 scale) above which a change counts as manual.
pub const BRIGHTNESS_CHANGE_THRESHOLD: i32 = 25;
/// Color temperature delta in Kelvin above which a change counts as manual.
pub const COLOR_TEMP_CHANGE_THRESHOLD: i64 = 100;
/// Redmean RGB distance (max ~765) above which a change counts as manual.
pub const RGB_REDMEAN_CHANGE_THRESHOLD: f64 = 80.0;

// # Dispatcher

/// Capacity of the bounded event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

// # Exit codes

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

// # Test constants
