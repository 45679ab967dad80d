//! Whole-ledger export and import.
//!
//! An export is one JSON document holding every table plus a small meta block. Importing
//! validates each row independently: bad rows are counted and skipped, never fatal. The
//! whole import runs in one transaction.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use pt_core::{
    FilterKind, ValidationError, format_stored_timestamp, parse_date, parse_timestamp,
    segment_session,
};
use rusqlite::{Transaction, params};
use serde::{Deserialize, Serialize};

use crate::identity::DisplayMappingRecord;
use crate::markers::{FinishedMarker, FirstLaunchOverride};
use crate::{Database, DbError};

/// Provenance of an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMeta {
    pub schema_version: i64,
    pub exported_at: String,
    pub timezone: String,
}

/// A segment row as exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedSegment {
    pub raw_identity: String,
    pub start_time: String,
    pub end_time: String,
    /// Informational; import recomputes it from the timestamps.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub calendar_date: String,
    #[serde(default)]
    pub first_launch: bool,
}

/// Every table of a ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerExport {
    pub meta: ExportMeta,
    #[serde(default)]
    pub segments: Vec<ExportedSegment>,
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default)]
    pub display_mapping: Vec<DisplayMappingRecord>,
    #[serde(default)]
    pub finished_markers: Vec<FinishedMarker>,
    #[serde(default)]
    pub first_launch_overrides: Vec<FirstLaunchOverride>,
}

impl LedgerExport {
    /// Parses an export document.
    pub fn from_json(text: &str) -> Result<Self, DbError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serializes the export as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, DbError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// How an import treats the existing ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Keep existing rows and add what is new.
    #[default]
    Merge,
    /// Clear every data table first.
    Replace,
}

impl ImportMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImportMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "replace" => Ok(Self::Replace),
            _ => Err(ValidationError::InvalidImportMode {
                value: s.to_string(),
            }),
        }
    }
}

/// Row counts from an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Segments written, after splitting rows that crossed a midnight.
    pub segments: usize,
    /// Segments already present and left alone.
    pub duplicates: usize,
    /// Rows of any table rejected as invalid.
    pub skipped: usize,
    pub filter_entries: usize,
    pub mappings: usize,
    pub finished_markers: usize,
    pub first_launch_overrides: usize,
}

impl Database {
    /// Exports every table.
    pub fn export_ledger(
        &self,
        timezone: &str,
        exported_at: &DateTime<FixedOffset>,
    ) -> Result<LedgerExport, DbError> {
        let segments = self
            .list_segments()?
            .into_iter()
            .map(|record| ExportedSegment {
                raw_identity: record.raw_identity,
                start_time: record.start_time,
                end_time: record.end_time,
                duration: record.duration,
                calendar_date: record.calendar_date,
                first_launch: record.first_launch,
            })
            .collect();
        Ok(LedgerExport {
            meta: ExportMeta {
                schema_version: self.schema_version()?,
                exported_at: format_stored_timestamp(exported_at),
                timezone: timezone.to_string(),
            },
            segments,
            whitelist: self.filter_names(FilterKind::Whitelist)?,
            blacklist: self.filter_names(FilterKind::Blacklist)?,
            display_mapping: self.mappings()?,
            finished_markers: self.finished_markers()?,
            first_launch_overrides: self.first_launch_overrides()?,
        })
    }

    /// Imports an export document.
    ///
    /// Segment rows keep their own offset and are re-split at local midnights, so rows
    /// from hand-edited or foreign exports still land one per calendar day. A raw identity
    /// keeps at most one `first_launch` segment.
    pub fn import_ledger(
        &mut self,
        export: &LedgerExport,
        mode: ImportMode,
    ) -> Result<ImportStats, DbError> {
        let tx = self.conn.transaction()?;
        if mode == ImportMode::Replace {
            tx.execute_batch(
                "
                DELETE FROM segments;
                DELETE FROM filter_entries;
                DELETE FROM display_mapping;
                DELETE FROM finished_markers;
                DELETE FROM first_launch_overrides;
                ",
            )?;
        }

        let mut stats = ImportStats::default();
        import_segments(&tx, &export.segments, &mut stats)?;
        import_filters(&tx, export, &mut stats)?;
        import_metadata(&tx, export, &mut stats)?;
        tx.commit()?;

        tracing::info!(%mode, ?stats, "imported ledger");
        Ok(stats)
    }
}

fn import_segments(
    tx: &Transaction<'_>,
    rows: &[ExportedSegment],
    stats: &mut ImportStats,
) -> Result<(), DbError> {
    let mut exists = tx.prepare(
        "SELECT EXISTS(SELECT 1 FROM segments WHERE raw_identity = ? AND start_time = ? AND end_time = ?)",
    )?;
    let mut launched =
        tx.prepare("SELECT EXISTS(SELECT 1 FROM segments WHERE raw_identity = ? AND first_launch = 1)")?;
    let mut insert = tx.prepare(
        "
        INSERT INTO segments (raw_identity, start_time, end_time, duration, calendar_date, first_launch)
        VALUES (?, ?, ?, ?, ?, ?)
        ",
    )?;

    for row in rows {
        let raw_identity = row.raw_identity.trim();
        let parsed = (
            parse_timestamp("start time", &row.start_time),
            parse_timestamp("end time", &row.end_time),
        );
        let (Ok(start), Ok(end)) = parsed else {
            tracing::warn!(raw_identity, start = %row.start_time, "skipping row with bad timestamps");
            stats.skipped += 1;
            continue;
        };
        if raw_identity.is_empty()
            || (!row.calendar_date.is_empty() && parse_date("calendar date", &row.calendar_date).is_err())
        {
            stats.skipped += 1;
            continue;
        }
        let end = end.with_timezone(&start.timezone());
        let pieces = segment_session(raw_identity, &start, &end, row.first_launch);
        if pieces.is_empty() {
            stats.skipped += 1;
            continue;
        }

        for piece in pieces {
            let (start_text, end_text) = (piece.start_text(), piece.end_text());
            let present: bool = exists.query_row(params![raw_identity, start_text, end_text], |r| r.get(0))?;
            if present {
                stats.duplicates += 1;
                continue;
            }
            let first_launch = piece.first_launch
                && !launched.query_row([raw_identity], |r| r.get::<_, bool>(0))?;
            insert.execute(params![
                raw_identity,
                start_text,
                end_text,
                piece.duration_secs(),
                piece.date_text(),
                first_launch,
            ])?;
            stats.segments += 1;
        }
    }
    Ok(())
}

fn import_filters(
    tx: &Transaction<'_>,
    export: &LedgerExport,
    stats: &mut ImportStats,
) -> Result<(), DbError> {
    let mut insert = tx.prepare("INSERT OR IGNORE INTO filter_entries (name, kind) VALUES (?, ?)")?;
    let lists = [
        (FilterKind::Whitelist, &export.whitelist),
        (FilterKind::Blacklist, &export.blacklist),
    ];
    for (kind, names) in lists {
        for name in names {
            let name = name.trim();
            if name.is_empty() {
                stats.skipped += 1;
                continue;
            }
            stats.filter_entries += insert.execute(params![name, kind.as_str()])?;
        }
    }
    Ok(())
}

fn import_metadata(
    tx: &Transaction<'_>,
    export: &LedgerExport,
    stats: &mut ImportStats,
) -> Result<(), DbError> {
    {
        let mut upsert = tx.prepare(
            "
            INSERT INTO display_mapping (raw_identity, display_name)
            VALUES (?, ?)
            ON CONFLICT(raw_identity) DO UPDATE SET display_name = excluded.display_name
            ",
        )?;
        for mapping in &export.display_mapping {
            let (raw, display) = (mapping.raw_identity.trim(), mapping.display_name.trim());
            if raw.is_empty() || display.is_empty() {
                stats.skipped += 1;
                continue;
            }
            upsert.execute(params![raw, display])?;
            stats.mappings += 1;
        }
    }

    {
        let mut upsert = tx.prepare(
            "
            INSERT INTO finished_markers (display_name, finished_at)
            VALUES (?, ?)
            ON CONFLICT(display_name) DO UPDATE SET finished_at = excluded.finished_at
            ",
        )?;
        for marker in &export.finished_markers {
            let name = marker.display_name.trim();
            let finished_at = marker
                .finished_at
                .as_deref()
                .map(str::trim)
                .filter(|date| !date.is_empty());
            let valid_date = finished_at.is_none_or(|date| parse_date("finish date", date).is_ok());
            if name.is_empty() || !valid_date {
                stats.skipped += 1;
                continue;
            }
            upsert.execute(params![name, finished_at])?;
            stats.finished_markers += 1;
        }
    }

    let mut upsert = tx.prepare(
        "
        INSERT INTO first_launch_overrides (display_name, first_date)
        VALUES (?, ?)
        ON CONFLICT(display_name) DO UPDATE SET first_date = excluded.first_date
        ",
    )?;
    for entry in &export.first_launch_overrides {
        let name = entry.display_name.trim();
        let first_date = entry.first_date.trim();
        if name.is_empty() || parse_date("first date", first_date).is_err() {
            stats.skipped += 1;
            continue;
        }
        upsert.execute(params![name, first_date])?;
        stats.first_launch_overrides += 1;
    }
    Ok(())
}
