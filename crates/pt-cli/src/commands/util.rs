//! Shared utilities for CLI commands.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use pt_core::{DateRange, Period, parse_date, period_range};

/// Today's date in the system zone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Resolves explicit bounds, falling back to the period ending today.
pub fn resolve_range(
    period: Period,
    start: Option<&str>,
    end: Option<&str>,
    today: NaiveDate,
) -> Result<DateRange> {
    match (start, end) {
        (Some(start), Some(end)) => DateRange::parse(start, end).context("invalid date range"),
        _ => Ok(period_range(period, today)),
    }
}

/// Parses an optional `YYYY-MM-DD` argument, defaulting to `today`.
pub fn date_or_today(value: Option<&str>, field: &'static str, today: NaiveDate) -> Result<NaiveDate> {
    value.map_or(Ok(today), |text| {
        parse_date(field, text).with_context(|| format!("invalid {field}"))
    })
}

/// Name of the system time zone, or `local` when it cannot be determined.
pub fn system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|err| {
        tracing::debug!(error = %err, "could not determine system time zone");
        "local".to_string()
    })
}

/// Formats seconds as duration string.
/// Returns "Xh Ym" if >= 1 hour, "Xm" if < 1 hour.
#[expect(
    clippy::cast_possible_truncation,
    reason = "durations are far below i64::MAX seconds"
)]
pub fn format_duration(seconds: f64) -> String {
    if seconds <= 0.0 {
        return "0m".to_string();
    }
    let total_minutes = (seconds / 60.0).floor() as i64;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Truncates by characters, not bytes, so multi-byte names never split.
pub fn truncate_name(name: &str, width: usize) -> String {
    if name.chars().count() > width {
        format!("{}...", name.chars().take(width.saturating_sub(3)).collect::<String>())
    } else {
        name.to_string()
    }
}
