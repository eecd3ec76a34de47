use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Wall-clock fields as the device expects them. `wday` counts from Monday = 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFields {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub wday: u32,
    pub hour: u32,
    pub min: u32,
    pub sec: u32,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown time zone: {0}")]
pub struct UnknownTimeZone(pub String);

pub fn parse_zone(name: &str) -> Result<Tz, UnknownTimeZone> {
    name.parse::<Tz>()
        .map_err(|_| UnknownTimeZone(name.to_string()))
}

/// Convert `now` into local wall-clock fields for the named IANA zone.
pub fn local_time(zone: &str, now: DateTime<Utc>) -> Result<TimeFields, UnknownTimeZone> {
    let tz = parse_zone(zone)?;
    let local = now.with_timezone(&tz);

    Ok(TimeFields {
        year: local.year(),
        month: local.month(),
        day: local.day(),
        wday: local.weekday().num_days_from_monday(),
        hour: local.hour(),
        min: local.minute(),
        sec: local.second(),
    })
}
