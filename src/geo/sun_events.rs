//! Sunrise, solar noon, sunset and solar midnight for a configured location.
//!
//! Fixed sunrise/sunset times, signed offsets and min/max clamps are layered on
//! top of the astronomical values. The four events of a day always follow the
//! cycle sunrise → noon → sunset → midnight (starting anywhere in it); a
//! configuration that breaks the cycle cannot be adapted and is reported as an
//! error.

use anyhow::Result;
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt;

use super::{Location, solar};
use crate::config::SunOverrides;

/// One of the four daily sun events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SunEvent {
    Sunrise,
    Noon,
    Sunset,
    Midnight,
}

impl SunEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SunEvent::Sunrise => "sunrise",
            SunEvent::Noon => "noon",
            SunEvent::Sunset => "sunset",
            SunEvent::Midnight => "midnight",
        }
    }

    fn is_horizon_crossing(self) -> bool {
        matches!(self, SunEvent::Sunrise | SunEvent::Sunset)
    }
}

impl fmt::Display for SunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sun event and the instant it happens.
pub type TimedEvent = (SunEvent, DateTime<Utc>);

const CYCLE: [SunEvent; 4] = [
    SunEvent::Sunrise,
    SunEvent::Noon,
    SunEvent::Sunset,
    SunEvent::Midnight,
];

/// Sun geometry of one switch (or of its independent color track).
#[derive(Debug, Clone, PartialEq)]
pub struct SunEvents {
    name: String,
    location: Location,
    overrides: SunOverrides,
}

impl SunEvents {
    pub fn new(name: impl Into<String>, location: Location, overrides: SunOverrides) -> Self {
        Self {
            name: name.into(),
            location,
            overrides,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn timezone(&self) -> Tz {
        self.location.timezone
    }

    /// Sunrise on `date`: fixed time or astronomy, plus offset, then clamped.
    pub fn sunrise(&self, date: NaiveDate) -> Result<DateTime<Utc>> {
        let o = &self.overrides;
        let base = match o.sunrise_time {
            Some(time) => self.localize(date, time)?,
            None => solar::astronomical_sunrise(&self.location, date)?,
        };
        self.clamp(
            date,
            base + Duration::seconds(o.sunrise_offset),
            o.min_sunrise_time,
            o.max_sunrise_time,
        )
    }

    /// Sunset on `date`: fixed time or astronomy, plus offset, then clamped.
    pub fn sunset(&self, date: NaiveDate) -> Result<DateTime<Utc>> {
        let o = &self.overrides;
        let base = match o.sunset_time {
            Some(time) => self.localize(date, time)?,
            None => solar::astronomical_sunset(&self.location, date)?,
        };
        self.clamp(
            date,
            base + Duration::seconds(o.sunset_offset),
            o.min_sunset_time,
            o.max_sunset_time,
        )
    }

    /// Solar noon and solar midnight on `date`.
    ///
    /// Astronomical transit when nothing is overridden, otherwise the
    /// midpoints of the (overridden) sunrise and sunset. Midnight is the one
    /// that opens the date, twelve hours before noon, so every night between a
    /// sunset and the next sunrise holds exactly one midnight.
    pub fn noon_and_midnight(&self, date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        if !self.overrides.has_time_overrides() {
            let noon = solar::solar_noon(&self.location, date);
            return Ok((noon, noon - half_day()));
        }
        let sunrise = self.sunrise(date)?;
        let sunset = self.sunset(date)?;
        Ok(midpoints(sunrise, sunset))
    }

    /// The four events of the local calendar date containing `at`, sorted.
    pub fn sun_events(&self, at: DateTime<Utc>) -> Result<[TimedEvent; 4]> {
        let date = at.with_timezone(&self.location.timezone).date_naive();
        self.sun_events_on(date)
    }

    /// The four events of `date`, sorted and checked against the daily cycle.
    pub fn sun_events_on(&self, date: NaiveDate) -> Result<[TimedEvent; 4]> {
        let sunrise = self.sunrise(date)?;
        let sunset = self.sunset(date)?;
        let (noon, midnight) = if self.overrides.has_time_overrides() {
            midpoints(sunrise, sunset)
        } else {
            self.noon_and_midnight(date)?
        };

        let mut events = [
            (SunEvent::Sunrise, sunrise),
            (SunEvent::Noon, noon),
            (SunEvent::Sunset, sunset),
            (SunEvent::Midnight, midnight),
        ];
        events.sort_by_key(|(_, at)| *at);
        self.validate_order(&events)?;
        Ok(events)
    }

    fn validate_order(&self, events: &[TimedEvent; 4]) -> Result<()> {
        let Some(start) = CYCLE.iter().position(|e| *e == events[0].0) else {
            anyhow::bail!("{}: unknown sun event", self.name);
        };
        let cyclic = events
            .iter()
            .enumerate()
            .all(|(i, (event, _))| *event == CYCLE[(start + i) % CYCLE.len()]);
        if cyclic {
            return Ok(());
        }

        let order = events
            .iter()
            .map(|(event, _)| event.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        log_error!(
            "{}: sun events in order [{}] do not follow sunrise, noon, sunset, midnight",
            self.name,
            order
        );
        anyhow::bail!(
            "{}: the sun events [{}] are not in the expected order. Adaptation is impossible; \
             a sunrise/sunset offset may be too large or a fixed sunrise/sunset time may fall \
             past noon or midnight",
            self.name,
            order
        )
    }

    /// The events immediately before (or at) and after `at`.
    pub fn prev_and_next_events(&self, at: DateTime<Utc>) -> Result<(TimedEvent, TimedEvent)> {
        let date = at.with_timezone(&self.location.timezone).date_naive();
        let mut events = Vec::with_capacity(12);
        for offset in [-1, 0, 1] {
            events.extend(self.sun_events_on(date + Duration::days(offset))?);
        }
        events.sort_by_key(|(_, ts)| *ts);

        let i = events.partition_point(|(_, ts)| *ts <= at);
        if i == 0 || i >= events.len() {
            anyhow::bail!("{}: no sun events bracket {}", self.name, at);
        }
        Ok((events[i - 1], events[i]))
    }

    /// Sun position in [-1, 1]: 1 at noon, 0 at sunrise/sunset, -1 at midnight.
    pub fn sun_position(&self, at: DateTime<Utc>) -> Result<f64> {
        let ((_, prev_at), (next_event, next_at)) = self.prev_and_next_events(at)?;
        let (h, x) = if next_event.is_horizon_crossing() {
            (prev_at, next_at)
        } else {
            (next_at, prev_at)
        };
        let k = if matches!(next_event, SunEvent::Sunset | SunEvent::Noon) {
            1.0
        } else {
            -1.0
        };

        let (t, h, x) = (seconds(at), seconds(h), seconds(x));
        Ok(k * (1.0 - ((t - h) / (h - x)).powi(2)))
    }

    /// The sunrise or sunset adjacent to `at`, sunrise preferred.
    pub fn closest_event(&self, at: DateTime<Utc>) -> Result<TimedEvent> {
        let (prev, next) = self.prev_and_next_events(at)?;
        [SunEvent::Sunrise, SunEvent::Sunset]
            .into_iter()
            .find_map(|wanted| [prev, next].into_iter().find(|(e, _)| *e == wanted))
            .ok_or_else(|| anyhow::anyhow!("{}: no sunrise or sunset next to {}", self.name, at))
    }

    fn localize(&self, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>> {
        localize(self.location.timezone, date, time)
    }

    fn clamp(
        &self,
        date: NaiveDate,
        value: DateTime<Utc>,
        min: Option<NaiveTime>,
        max: Option<NaiveTime>,
    ) -> Result<DateTime<Utc>> {
        let mut value = value;
        if let Some(min) = min {
            value = value.max(self.localize(date, min)?);
        }
        if let Some(max) = max {
            value = value.min(self.localize(date, max)?);
        }
        Ok(value)
    }
}

/// Combine a local wall-clock time with a date in `tz`.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant; times in a
/// DST gap are moved forward by an hour.
pub fn localize(tz: Tz, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>> {
    let naive = date.and_time(time);
    let local = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz.from_local_datetime(&(naive + Duration::hours(1))).earliest(),
    };
    local
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow::anyhow!("{naive} does not exist in timezone {tz}"))
}

fn half_day() -> Duration {
    Duration::hours(12)
}

/// Noon and midnight halfway between a sunrise and a sunset of one date.
///
/// When the sunset comes first the night sits between them and noon is the
/// one twelve hours earlier.
fn midpoints(sunrise: DateTime<Utc>, sunset: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let middle = (sunset - sunrise).abs() / 2;
    if sunset > sunrise {
        let noon = sunrise + middle;
        (noon, noon - half_day())
    } else {
        let midnight = sunset + middle;
        (midnight - half_day(), midnight)
    }
}

fn seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}
