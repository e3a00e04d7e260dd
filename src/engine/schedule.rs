//! Manual brightness/color schedules.
//!
//! A schedule is a set of points on the 24-hour clock. Between two points the
//! values are interpolated by elapsed time; after the last point of the day the
//! curve wraps around midnight to the first one.

use anyhow::Result;
use chrono::{NaiveTime, Timelike};

use crate::config::{ColorSchedulePointConfig, SchedulePointConfig};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulePoint {
    pub time: NaiveTime,
    pub brightness_pct: f64,
    pub color_temp: u32,
}

/// Points sorted by time of day.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    points: Vec<SchedulePoint>,
}

impl Schedule {
    pub fn new(mut points: Vec<SchedulePoint>) -> Result<Self> {
        if points.is_empty() {
            anyhow::bail!("A schedule needs at least one point");
        }
        points.sort_by_key(|p| p.time);
        Ok(Self { points })
    }

    pub fn from_config(points: &[SchedulePointConfig]) -> Result<Self> {
        Self::new(
            points
                .iter()
                .map(|p| SchedulePoint {
                    time: p.time,
                    brightness_pct: p.brightness_pct,
                    color_temp: p.color_temp,
                })
                .collect(),
        )
    }

    /// Color-only schedule; brightness of its points is unused.
    pub fn from_color_config(points: &[ColorSchedulePointConfig]) -> Result<Self> {
        Self::new(
            points
                .iter()
                .map(|p| SchedulePoint {
                    time: p.time,
                    brightness_pct: 0.0,
                    color_temp: p.color_temp,
                })
                .collect(),
        )
    }

    pub fn points(&self) -> &[SchedulePoint] {
        &self.points
    }

    /// Interpolated values at `time`. An exact match returns the stored point.
    pub fn at(&self, time: NaiveTime) -> SchedulePoint {
        let after_idx = self.points.partition_point(|p| p.time <= time);
        let before = if after_idx == 0 {
            self.points[self.points.len() - 1]
        } else {
            self.points[after_idx - 1]
        };
        if before.time == time || self.points.len() == 1 {
            return before;
        }
        let after = self.points.get(after_idx).copied().unwrap_or(self.points[0]);

        let span = seconds_between(before.time, after.time);
        let elapsed = seconds_between(before.time, time);
        let fraction = if span > 0.0 { elapsed / span } else { 0.0 };

        let brightness_pct =
            before.brightness_pct + (after.brightness_pct - before.brightness_pct) * fraction;
        let color_temp = f64::from(before.color_temp)
            + (f64::from(after.color_temp) - f64::from(before.color_temp)) * fraction;

        SchedulePoint {
            time,
            brightness_pct,
            color_temp: color_temp.round() as u32,
        }
    }
}

/// Seconds from `from` forward to `to`, wrapping through midnight.
fn seconds_between(from: NaiveTime, to: NaiveTime) -> f64 {
    let from = f64::from(from.num_seconds_from_midnight());
    let to = f64::from(to.num_seconds_from_midnight());
    (to - from).rem_euclid(SECONDS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn point(h: u32, m: u32, brightness_pct: f64, color_temp: u32) -> SchedulePoint {
        SchedulePoint {
            time: t(h, m),
            brightness_pct,
            color_temp,
        }
    }

    #[test]
    fn test_midpoint_between_two_points() {
        let schedule =
            Schedule::new(vec![point(13, 0, 100.0, 4500), point(9, 0, 100.0, 4000)]).unwrap();
        let value = schedule.at(t(11, 0));
        assert_eq!(value.brightness_pct, 100.0);
        assert_eq!(value.color_temp, 4250);
    }

    #[test]
    fn test_interpolation_wraps_through_midnight() {
        let schedule =
            Schedule::new(vec![point(23, 0, 50.0, 2500), point(6, 0, 60.0, 2700)]).unwrap();
        let value = schedule.at(t(2, 30));
        assert!((value.brightness_pct - 55.0).abs() < 1e-9);
        assert_eq!(value.color_temp, 2600);

        // Before midnight, on the same wrapped segment
        let value = schedule.at(t(23, 21));
        assert!((value.brightness_pct - 50.5).abs() < 1e-9);
    }

    #[test]
    fn test_exact_match_returns_stored_point() {
        let schedule = Schedule::new(vec![
            point(7, 0, 40.0, 3000),
            point(12, 0, 100.0, 5000),
            point(20, 0, 30.0, 2200),
        ])
        .unwrap();
        assert_eq!(schedule.at(t(12, 0)), point(12, 0, 100.0, 5000));
        assert_eq!(schedule.at(t(7, 0)), point(7, 0, 40.0, 3000));
    }

    #[test]
    fn test_single_point_is_constant() {
        let schedule = Schedule::new(vec![point(8, 0, 70.0, 3500)]).unwrap();
        assert_eq!(schedule.at(t(3, 0)).color_temp, 3500);
        assert_eq!(schedule.at(t(22, 0)).brightness_pct, 70.0);
    }

    #[test]
    fn test_empty_schedule_is_rejected() {
        assert!(Schedule::new(Vec::new()).is_err());
    }
}
