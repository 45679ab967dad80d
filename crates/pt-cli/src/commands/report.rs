//! Analytical reports: summary, series, calendar, meta and day timeline.
//!
//! Every report takes an inclusive date range, either explicit (`--start`/`--end`) or the
//! period ending today, and prints a table or JSON.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use pt_core::{DateRange, Granularity, Period, TimelineZone};
use pt_db::Database;
use serde::Serialize;

use super::util::{date_or_today, format_duration, resolve_range, truncate_name};

const NAME_WIDTH: usize = 28;

#[derive(Debug, Args)]
pub struct RangeArgs {
    /// Period ending today: week, month or year.
    #[arg(long, default_value = "week")]
    pub period: Period,

    /// First day (YYYY-MM-DD); needs --end.
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    /// Last day (YYYY-MM-DD); needs --start.
    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RangeArgs {
    fn range(&self, today: NaiveDate) -> Result<DateRange> {
        resolve_range(self.period, self.start.as_deref(), self.end.as_deref(), today)
    }
}

#[derive(Debug, Args)]
pub struct SeriesArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    /// Bucket size for yearly periods: week buckets by week, anything else by month.
    #[arg(long, default_value = "day")]
    pub granularity: Granularity,
}

#[derive(Debug, Args)]
pub struct TimelineArgs {
    /// Day to show (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    pub date: Option<String>,

    /// Zone to render in: local, utc, an offset like +02:00 or an IANA name like
    /// Europe/Paris. Overrides the config.
    #[arg(long)]
    pub zone: Option<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// A report wrapped with the range it covers.
#[derive(Debug, Serialize)]
struct Report<'a, T: Serialize> {
    start: String,
    end: String,
    #[serde(flatten)]
    body: &'a T,
}

fn write_json<W: Write, T: Serialize>(writer: &mut W, range: &DateRange, body: &T) -> Result<()> {
    let report = Report {
        start: range.start_str(),
        end: range.end_str(),
        body,
    };
    writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct Items<'a, T: Serialize> {
    items: &'a [T],
}

pub fn summary<W: Write>(writer: &mut W, db: &Database, args: &RangeArgs, today: NaiveDate) -> Result<()> {
    let range = args.range(today)?;
    let items = db.summary(&range).context("failed to compute summary")?;
    if args.json {
        return write_json(writer, &range, &Items { items: &items });
    }

    writeln!(writer, "SUMMARY: {} to {}", range.start_str(), range.end_str())?;
    if items.is_empty() {
        writeln!(writer, "No activity in this period.")?;
        return Ok(());
    }
    let total: f64 = items.iter().map(|item| item.seconds).sum();
    for item in &items {
        writeln!(
            writer,
            "{:<width$}  {:>8}",
            truncate_name(&item.name, NAME_WIDTH),
            format_duration(item.seconds),
            width = NAME_WIDTH
        )?;
    }
    writeln!(
        writer,
        "{:<width$}  {:>8}",
        "TOTAL",
        format_duration(total),
        width = NAME_WIDTH
    )?;
    Ok(())
}

pub fn series<W: Write>(writer: &mut W, db: &Database, args: &SeriesArgs, today: NaiveDate) -> Result<()> {
    let range = args.range.range(today)?;
    let series = db
        .series(args.range.period, &range, args.granularity)
        .context("failed to compute series")?;
    if args.range.json {
        return write_json(writer, &range, &series);
    }

    writeln!(writer, "SERIES: {} to {}", range.start_str(), range.end_str())?;
    if series.identities.is_empty() {
        writeln!(writer, "No activity in this period.")?;
        return Ok(());
    }
    // One row per bucket, one column per identity.
    let mut header = format!("{:<10}", "Bucket");
    for name in &series.identities {
        let _ = write!(header, "  {:>12}", truncate_name(name, 12));
    }
    writeln!(writer, "{}", header.trim_end())?;
    for (column, label) in series.labels.iter().enumerate() {
        let mut line = format!("{label:<10}");
        for row in &series.matrix {
            let seconds = row.get(column).copied().unwrap_or_default();
            let _ = write!(line, "  {:>12}", format_duration(seconds));
        }
        writeln!(writer, "{line}")?;
    }
    Ok(())
}

pub fn calendar<W: Write>(writer: &mut W, db: &Database, args: &RangeArgs, today: NaiveDate) -> Result<()> {
    let range = args.range(today)?;
    let days = db.calendar_days(&range).context("failed to compute calendar")?;
    if args.json {
        return write_json(writer, &range, &serde_json::json!({ "days": days }));
    }

    writeln!(writer, "CALENDAR: {} to {}", range.start_str(), range.end_str())?;
    for day in &days {
        let mut line = format!("{}  {:>8}", day.date, format_duration(day.seconds));
        if !day.new.is_empty() {
            let _ = write!(line, "  new: {}", day.new.join(", "));
        }
        if !day.finished.is_empty() {
            let _ = write!(line, "  finished: {}", day.finished.join(", "));
        }
        writeln!(writer, "{line}")?;
    }
    Ok(())
}

pub fn meta<W: Write>(writer: &mut W, db: &Database, args: &RangeArgs, today: NaiveDate) -> Result<()> {
    let range = args.range(today)?;
    let games = db.games_meta(&range).context("failed to compute identity flags")?;
    if args.json {
        return write_json(writer, &range, &serde_json::json!({ "games": games }));
    }

    writeln!(writer, "PLAYED: {} to {}", range.start_str(), range.end_str())?;
    if games.is_empty() {
        writeln!(writer, "No activity in this period.")?;
        return Ok(());
    }
    for game in &games {
        let mut flags = Vec::new();
        if game.is_new {
            flags.push("new");
        }
        if game.finished_in_period {
            flags.push("finished");
        }
        let line = format!(
            "{:<width$}  {}",
            truncate_name(&game.name, NAME_WIDTH),
            flags.join(", "),
            width = NAME_WIDTH
        );
        writeln!(writer, "{}", line.trim_end())?;
    }
    Ok(())
}

pub fn timeline<W: Write>(
    writer: &mut W,
    db: &Database,
    args: &TimelineArgs,
    default_zone: &str,
    today: NaiveDate,
) -> Result<()> {
    let date = date_or_today(args.date.as_deref(), "timeline date", today)?;
    let zone: TimelineZone = args
        .zone
        .as_deref()
        .unwrap_or(default_zone)
        .parse()
        .context("invalid timeline zone")?;
    let timeline = db
        .day_timeline(date, zone)
        .context("failed to build timeline")?;
    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&timeline)?)?;
        return Ok(());
    }

    writeln!(writer, "TIMELINE: {} ({})", timeline.date, timeline.zone)?;
    if timeline.segments.is_empty() {
        writeln!(writer, "No activity on this day.")?;
        return Ok(());
    }
    for segment in &timeline.segments {
        writeln!(
            writer,
            "{} - {}  {}",
            clock(segment.start_sec),
            clock(segment.end_sec),
            segment.name
        )?;
    }
    Ok(())
}

/// Seconds from midnight as `HH:MM:SS`; a full day shows as `24:00:00`.
fn clock(seconds: i64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        seconds % 3600 / 60,
        seconds % 60
    )
}
