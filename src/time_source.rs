//! Time source abstraction for supporting both real-time and simulated time.
//!
//! The engine itself is pure: every computation takes an explicit instant. The
//! switch controller asks a `TimeSource` for "now" so that tests and the CLI
//! preview can pin the clock without touching the system time. Suspension
//! (sleeps, timers) always goes through `tokio::time`, which tests pause and
//! advance independently.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Mutex;

/// Trait for abstracting wall-clock reads.
pub trait TimeSource: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Check if this is a simulated time source.
    fn is_simulated(&self) -> bool;
}

/// Real-time implementation that uses actual system time.
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Manually driven clock for tests and previews.
///
/// Time only moves when `set` or `advance` is called.
pub struct SimulatedTimeSource {
    current: Mutex<DateTime<Utc>>,
}

impl SimulatedTimeSource {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start_time),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.lock() = time;
    }

    pub fn advance(&self, by: ChronoDuration) {
        let mut current = self.lock();
        *current += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // A poisoned clock still holds a valid instant
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
