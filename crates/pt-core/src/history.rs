//! Rebuilding logical sessions from stored segments.
//!
//! This is the inverse of [`segment_session`](crate::segment_session): back-to-back segments
//! of one display identity collapse into the session that produced them.

use chrono::DateTime;
use serde::Serialize;

/// One history row: either a stored segment or a merged run of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Resolved display identity.
    pub name: String,
    /// Raw identity of the first segment in the run.
    pub original: String,
    /// Calendar date of the first segment in the run.
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub seconds: f64,
    pub finished: bool,
    pub blacklisted: bool,
}

/// Merges contiguous entries and returns them newest first.
///
/// `entries` must be ordered by ascending start time. Two neighbours merge when they share
/// the display name and blacklist flag and the earlier one ends exactly when the later one
/// starts.
pub fn merge_contiguous(entries: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
    let mut merged: Vec<HistoryEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(current) = merged.last_mut() {
            if current.name == entry.name
                && current.blacklisted == entry.blacklisted
                && same_instant(&current.end_time, &entry.start_time)
            {
                current.end_time = entry.end_time;
                current.seconds += entry.seconds;
                current.finished |= entry.finished;
                continue;
            }
        }
        merged.push(entry);
    }
    merged.reverse();
    merged
}

/// Exact contiguity check between two stored timestamps.
///
/// Timestamps written in different offsets still match when they denote the same instant;
/// unparsable legacy values only match byte for byte.
fn same_instant(end: &str, start: &str) -> bool {
    match (
        DateTime::parse_from_rfc3339(end),
        DateTime::parse_from_rfc3339(start),
    ) {
        (Ok(end), Ok(start)) => end == start,
        _ => end == start,
    }
}
