// libs/agenda-cell/src/services/clock.rs
//
// Pure time arithmetic for the agenda. All wall-clock times are minutes
// since local midnight; dates are naive clinic-local dates.
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serializer;

use crate::models::{AgendaError, TimePoint};

/// Parse `"HH:MM"` or `"HH:MM:SS"` into minutes since midnight.
/// A trailing seconds component is ignored.
pub fn to_minutes(time: &str) -> Result<TimePoint, AgendaError> {
    let mut parts = time.split(':');

    let hours: u16 = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .ok_or_else(|| AgendaError::InvalidFormat(time.to_string()))?;
    let minutes: u16 = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .ok_or_else(|| AgendaError::InvalidFormat(time.to_string()))?;

    if hours >= 24 || minutes >= 60 {
        return Err(AgendaError::InvalidFormat(time.to_string()));
    }

    Ok(hours * 60 + minutes)
}

/// Format minutes since midnight as zero-padded `HH:MM`.
pub fn format_minutes(t: TimePoint) -> String {
    format!("{:02}:{:02}", t / 60, t % 60)
}

pub fn serialize_minutes<S: Serializer>(t: &TimePoint, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_minutes(*t))
}

pub fn serialize_opt_minutes<S: Serializer>(
    t: &Option<TimePoint>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match t {
        Some(t) => serializer.serialize_some(&format_minutes(*t)),
        None => serializer.serialize_none(),
    }
}

/// Weekday index used throughout the agenda: 0 = Sunday .. 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> usize {
    date.weekday().num_days_from_sunday() as usize
}

/// The Monday..Saturday span of the week containing a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekRange {
    pub monday: NaiveDate,
    pub saturday: NaiveDate,
    pub days: [NaiveDate; 6],
}

/// Compute the working week (Monday to Saturday) around a date.
/// A Sunday maps 6 days back to the Monday of the week that just ended,
/// never forward.
pub fn week_range(date: NaiveDate) -> WeekRange {
    let offset = date.weekday().num_days_from_monday() as i64;
    let monday = date - Duration::days(offset);
    let days = core::array::from_fn(|i| monday + Duration::days(i as i64));

    WeekRange {
        monday,
        saturday: days[5],
        days,
    }
}
