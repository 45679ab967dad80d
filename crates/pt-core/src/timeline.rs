//! Day timeline clipping.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::segment::local_midnight;
use crate::types::ValidationError;

/// Zone a day timeline is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimelineZone {
    /// The system's local zone.
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
    /// An IANA zone such as `Europe/Paris`, with its daylight-saving rules.
    Named(Tz),
}

impl FromStr for TimelineZone {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
            return Ok(Self::Utc);
        }
        if let Ok(offset) = trimmed.parse::<FixedOffset>() {
            return Ok(Self::Fixed(offset));
        }
        trimmed
            .parse::<Tz>()
            .map(Self::Named)
            .map_err(|_| ValidationError::InvalidZone {
                value: s.to_string(),
            })
    }
}

impl fmt::Display for TimelineZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Utc => write!(f, "utc"),
            Self::Fixed(offset) => write!(f, "{offset}"),
            Self::Named(tz) => f.write_str(tz.name()),
        }
    }
}

/// A stored interval to place on the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineInterval {
    pub name: String,
    pub start_time: String,
    pub end_time: String,
}

/// An interval expressed as second offsets from local midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineSegment {
    pub name: String,
    pub start_sec: i64,
    pub end_sec: i64,
}

/// Clips intervals to `[midnight(date), midnight(date) + 24h)` in `zone`.
///
/// Midnight is the zone's own start of `date`, so on a daylight-saving day in a named zone
/// the offsets differ from those of either fixed offset the zone uses that day.
///
/// Intervals with unparsable timestamps or no overlap with the window are dropped. The
/// result is ordered by start offset.
pub fn clip_to_day(
    intervals: &[TimelineInterval],
    date: NaiveDate,
    zone: TimelineZone,
) -> Vec<TimelineSegment> {
    match zone {
        TimelineZone::Local => clip_in(&Local, intervals, date),
        TimelineZone::Utc => clip_in(&Utc, intervals, date),
        TimelineZone::Fixed(offset) => clip_in(&offset, intervals, date),
        TimelineZone::Named(tz) => clip_in(&tz, intervals, date),
    }
}

fn clip_in<Tz: TimeZone>(
    tz: &Tz,
    intervals: &[TimelineInterval],
    date: NaiveDate,
) -> Vec<TimelineSegment> {
    let day_start = local_midnight(tz, date).with_timezone(&Utc);
    let day_end = day_start + Duration::hours(24);

    let mut segments: Vec<TimelineSegment> = intervals
        .iter()
        .filter_map(|interval| {
            let start = parse_utc(&interval.start_time)?;
            let end = parse_utc(&interval.end_time)?;
            let start = start.max(day_start);
            let end = end.min(day_end);
            if end <= start {
                return None;
            }
            Some(TimelineSegment {
                name: interval.name.clone(),
                start_sec: start.signed_duration_since(day_start).num_seconds(),
                end_sec: end.signed_duration_since(day_start).num_seconds(),
            })
        })
        .filter(|segment| segment.end_sec > segment.start_sec)
        .collect();
    segments.sort_by_key(|segment| segment.start_sec);
    segments
}

fn parse_utc(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
