//! Astronomical calculations for sunrise, sunset and solar noon.
//!
//! Sunrise and sunset come from the `sunrise` crate. Solar noon is the NOAA
//! transit time, which also gives the declination needed to detect polar day
//! and polar night before asking for events that don't exist.

use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use sunrise::{Coordinates, SolarDay, SolarEvent};

use super::Location;

/// Zenith of the apparent sunrise/sunset (refraction + solar radius), degrees.
const SUNRISE_ZENITH: f64 = 90.833;

/// Julian century terms for a date at 12:00 UTC.
struct SolarTerms {
    declination: f64,
    /// Equation of time in minutes
    equation_of_time: f64,
}

fn julian_day(date: NaiveDate) -> f64 {
    // JD of 0001-01-01T00:00 is 1721425.5 and num_days_from_ce() starts at 1
    f64::from(date.num_days_from_ce()) + 1_721_424.5
}

fn solar_terms(date: NaiveDate, minutes_utc: f64) -> SolarTerms {
    let jd = julian_day(date) + minutes_utc / 1440.0;
    let t = (jd - 2_451_545.0) / 36_525.0;

    let mean_long = (280.46646 + t * (36000.76983 + t * 0.0003032)).rem_euclid(360.0);
    let mean_anom = 357.52911 + t * (35999.05029 - 0.0001537 * t);
    let eccent = 0.016708634 - t * (0.000042037 + 0.0000001267 * t);

    let m = mean_anom.to_radians();
    let center = m.sin() * (1.914602 - t * (0.004817 + 0.000014 * t))
        + (2.0 * m).sin() * (0.019993 - 0.000101 * t)
        + (3.0 * m).sin() * 0.000289;
    let true_long = mean_long + center;
    let omega = (125.04 - 1934.136 * t).to_radians();
    let app_long = true_long - 0.00569 - 0.00478 * omega.sin();

    let mean_obliq =
        23.0 + (26.0 + (21.448 - t * (46.815 + t * (0.00059 - t * 0.001813))) / 60.0) / 60.0;
    let obliq = (mean_obliq + 0.00256 * omega.cos()).to_radians();

    let declination = (obliq.sin() * app_long.to_radians().sin()).asin();

    let y = (obliq / 2.0).tan().powi(2);
    let l0 = mean_long.to_radians();
    let eot = y * (2.0 * l0).sin() - 2.0 * eccent * m.sin()
        + 4.0 * eccent * y * m.sin() * (2.0 * l0).cos()
        - 0.5 * y * y * (4.0 * l0).sin()
        - 1.25 * eccent * eccent * (2.0 * m).sin();

    SolarTerms {
        declination,
        equation_of_time: 4.0 * eot.to_degrees(),
    }
}

/// Solar noon (sun transit) for `date` at the location's longitude.
pub fn solar_noon(location: &Location, date: NaiveDate) -> DateTime<Utc> {
    // Two passes: evaluate the equation of time close to the actual transit
    let first = 720.0 - 4.0 * location.longitude;
    let terms = solar_terms(date, first);
    let second = 720.0 - 4.0 * location.longitude - terms.equation_of_time;
    let terms = solar_terms(date, second);
    let minutes = 720.0 - 4.0 * location.longitude - terms.equation_of_time;

    let midnight_utc = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    midnight_utc + Duration::milliseconds((minutes * 60_000.0).round() as i64)
}

/// Whether the sun crosses the horizon on `date` at this latitude.
///
/// Returns the cosine of the sunrise hour angle; values outside [-1, 1] mean
/// polar night (> 1) or midnight sun (< -1).
pub fn sunrise_hour_angle_cos(location: &Location, date: NaiveDate) -> f64 {
    let noon_minutes = 720.0 - 4.0 * location.longitude;
    let decl = solar_terms(date, noon_minutes).declination;
    let lat = location.latitude.to_radians();
    SUNRISE_ZENITH.to_radians().cos() / (lat.cos() * decl.cos()) - lat.tan() * decl.tan()
}

fn solar_day(location: &Location, date: NaiveDate) -> Result<SolarDay> {
    let coord = Coordinates::new(location.latitude, location.longitude).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid coordinates {:.4}°, {:.4}°",
            location.latitude,
            location.longitude
        )
    })?;

    let cos_h = sunrise_hour_angle_cos(location, date);
    if !(-1.0..=1.0).contains(&cos_h) {
        anyhow::bail!(
            "The sun does not {} at latitude {:.4}° on {}. Configure sunrise_time and sunset_time for this location",
            if cos_h > 1.0 { "rise" } else { "set" },
            location.latitude,
            date
        );
    }

    Ok(SolarDay::new(coord, date).with_altitude(location.elevation))
}

/// Astronomical sunrise for `date`.
pub fn astronomical_sunrise(location: &Location, date: NaiveDate) -> Result<DateTime<Utc>> {
    Ok(solar_day(location, date)?.event_time(SolarEvent::Sunrise))
}

/// Astronomical sunset for `date`.
pub fn astronomical_sunset(location: &Location, date: NaiveDate) -> Result<DateTime<Utc>> {
    Ok(solar_day(location, date)?.event_time(SolarEvent::Sunset))
}
