//! Session segmentation.
//!
//! A finished session `[start, end)` is split at every local midnight so that each stored
//! segment contributes to exactly one calendar day. Midnights are computed with calendar
//! arithmetic in the session's own zone, so a day that is 23 or 25 hours long across a
//! daylight-saving change still ends at the next local midnight.

use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDate, NaiveTime, SecondsFormat, SubsecRound,
    TimeZone,
};
use serde::Serialize;

use crate::types::DATE_FORMAT;

/// One day-bounded stored interval of activity for a raw identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySegment {
    pub raw_identity: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub calendar_date: NaiveDate,
    pub first_launch: bool,
}

impl ActivitySegment {
    /// Length of the segment in whole seconds.
    #[must_use]
    pub fn duration_secs(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_seconds()
    }

    /// Start timestamp in the canonical stored form.
    #[must_use]
    pub fn start_text(&self) -> String {
        format_stored_timestamp(&self.start)
    }

    /// End timestamp in the canonical stored form.
    #[must_use]
    pub fn end_text(&self) -> String {
        format_stored_timestamp(&self.end)
    }

    /// Calendar date in `YYYY-MM-DD` form.
    #[must_use]
    pub fn date_text(&self) -> String {
        self.calendar_date.format(DATE_FORMAT).to_string()
    }
}

/// Formats a timestamp the way segments store it: RFC 3339, whole seconds, explicit offset.
///
/// The first ten characters are therefore always the local calendar date.
#[must_use]
pub fn format_stored_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Splits `[start, end)` into calendar-day-bounded segments in the zone of `start`.
///
/// Returns nothing when `end <= start`. Sub-second precision is dropped first so stored
/// text and durations agree. Only the first emitted segment carries `first_launch`, and
/// only when `is_first` is set.
pub fn segment_session<Tz: TimeZone>(
    raw_identity: &str,
    start: &DateTime<Tz>,
    end: &DateTime<Tz>,
    is_first: bool,
) -> Vec<ActivitySegment> {
    let start = start.clone().trunc_subsecs(0);
    let end = end.clone().trunc_subsecs(0);
    if end <= start {
        return Vec::new();
    }

    let tz = start.timezone();
    let mut segments = Vec::new();
    let mut first = is_first;
    let mut cursor = start;
    while cursor < end {
        let date = cursor.date_naive();
        let next_midnight = next_local_midnight(&tz, date);
        let segment_end = if end < next_midnight {
            end.clone()
        } else {
            next_midnight
        };

        if segment_end > cursor {
            segments.push(ActivitySegment {
                raw_identity: raw_identity.to_string(),
                start: cursor.fixed_offset(),
                end: segment_end.fixed_offset(),
                calendar_date: date,
                first_launch: first,
            });
            first = false;
        }

        cursor = segment_end;
    }
    segments
}

/// Local midnight that starts the day after `date` in `tz`.
fn next_local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let next_day = date.succ_opt().unwrap_or(NaiveDate::MAX);
    local_midnight(tz, next_day)
}

/// Start of `date` in `tz`.
///
/// On a daylight-saving fall-back the earlier instant is used. A spring-forward gap at
/// midnight falls through to the first hour that exists.
pub fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    for hour in 0..24 {
        let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0) else {
            continue;
        };
        match tz.from_local_datetime(&date.and_time(time)) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => return dt,
            LocalResult::None => {}
        }
    }
    tz.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}
