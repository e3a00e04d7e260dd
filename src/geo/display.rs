//! Display of a day's sun events.

use anyhow::Result;
use chrono::NaiveDate;

use super::SunEvents;

/// Log the four sun events of `date` in the location's timezone.
pub fn log_sun_events(events: &SunEvents, date: NaiveDate) -> Result<()> {
    let tz = events.timezone();
    let day = events.sun_events_on(date)?;

    log_block_start!("Sun events for '{}' on {} ({})", events.name(), date, tz);
    for (event, at) in day {
        log_indented!(
            "{:<9} {}",
            format!("{event}:"),
            at.with_timezone(&tz).format("%H:%M:%S")
        );
    }

    let location = events.location();
    log_debug!(
        "Coordinates {:.4}°, {:.4}° at {}m",
        location.latitude,
        location.longitude,
        location.elevation
    );
    Ok(())
}
