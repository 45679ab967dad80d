//! Segment writes and ledger status.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use pt_core::{RawIdentity, parse_timestamp};
use pt_db::Database;

use super::util::format_duration;

#[derive(Debug, Args)]
pub struct RecordArgs {
    /// Raw identity of the program (e.g. its executable name).
    pub raw_identity: String,

    /// Session start (RFC 3339, e.g. 2024-03-10T23:00:00+01:00).
    #[arg(long)]
    pub start: String,

    /// Session end (RFC 3339).
    #[arg(long)]
    pub end: String,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Raw identity of the segment.
    pub raw_identity: String,

    /// Stored start timestamp, exactly as listed.
    #[arg(long)]
    pub start: String,

    /// Stored end timestamp, exactly as listed.
    #[arg(long)]
    pub end: String,
}

pub fn record<W: Write>(writer: &mut W, db: &mut Database, args: &RecordArgs) -> Result<()> {
    let raw_identity = RawIdentity::new(args.raw_identity.as_str())?;
    let start = parse_timestamp("start time", &args.start)?;
    let end = parse_timestamp("end time", &args.end)?;
    let segments = db
        .record_session(&raw_identity, &start, &end)
        .context("failed to record session")?;

    if segments.is_empty() {
        writeln!(writer, "Nothing recorded: session has no duration.")?;
        return Ok(());
    }
    writeln!(
        writer,
        "Recorded {} segment(s) for {raw_identity}:",
        segments.len()
    )?;
    for segment in &segments {
        #[expect(clippy::cast_precision_loss, reason = "segment durations are small")]
        let seconds = segment.duration_secs() as f64;
        writeln!(
            writer,
            "  {}  {} -> {}  {:>7}{}",
            segment.date_text(),
            segment.start_text(),
            segment.end_text(),
            format_duration(seconds),
            if segment.first_launch { "  (first launch)" } else { "" }
        )?;
    }
    Ok(())
}

pub fn delete<W: Write>(writer: &mut W, db: &mut Database, args: &DeleteArgs) -> Result<()> {
    let raw_identity = RawIdentity::new(args.raw_identity.as_str())?;
    let removed = db
        .delete_segment(&raw_identity, &args.start, &args.end)
        .context("failed to delete segment")?;
    if removed == 0 {
        writeln!(writer, "No segment matched.")?;
    } else {
        writeln!(writer, "Deleted {removed} segment(s).")?;
    }
    Ok(())
}

pub fn status<W: Write>(writer: &mut W, db: &Database, database_path: &Path, json: bool) -> Result<()> {
    let status = db.status()?;
    if json {
        let output = serde_json::json!({
            "database_path": database_path.display().to_string(),
            "status": status,
        });
        writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
        return Ok(());
    }

    writeln!(writer, "Playtime status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(writer, "Schema version: {}", status.schema_version)?;
    writeln!(
        writer,
        "Segments: {} ({} raw identities)",
        status.segments, status.raw_identities
    )?;
    writeln!(writer, "Display mappings: {}", status.display_mappings)?;
    writeln!(
        writer,
        "Filters: {} whitelisted, {} blacklisted",
        status.whitelist, status.blacklist
    )?;
    match (&status.first_date, &status.last_date) {
        (Some(first), Some(last)) => writeln!(writer, "Activity: {first} to {last}")?,
        _ => writeln!(writer, "No activity recorded.")?,
    }
    Ok(())
}
