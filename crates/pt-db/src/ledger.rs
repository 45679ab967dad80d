//! Segment writes and raw segment access.

use chrono::{DateTime, TimeZone};
use pt_core::{ActivitySegment, RawIdentity, parse_timestamp, segment_session};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;

use crate::{Database, DbError, migrations};

/// A stored segment row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRecord {
    pub id: i64,
    pub raw_identity: String,
    pub start_time: String,
    pub end_time: String,
    pub duration: f64,
    pub calendar_date: String,
    pub first_launch: bool,
}

/// Overview counters for the whole ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStatus {
    pub schema_version: i64,
    pub segments: i64,
    pub raw_identities: i64,
    pub display_mappings: i64,
    pub whitelist: i64,
    pub blacklist: i64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
}

impl Database {
    /// Records a finished session as day-bounded segments.
    ///
    /// `first_launch` is set on the first segment when the raw identity has never been
    /// recorded. The existence check and every insert share one transaction. A session
    /// with `end <= start` writes nothing.
    pub fn record_session<Tz: TimeZone>(
        &mut self,
        raw_identity: &RawIdentity,
        start: &DateTime<Tz>,
        end: &DateTime<Tz>,
    ) -> Result<Vec<ActivitySegment>, DbError> {
        let tx = self.conn.transaction()?;
        let seen: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM segments WHERE raw_identity = ?)",
            [raw_identity.as_str()],
            |row| row.get(0),
        )?;
        let segments = segment_session(raw_identity.as_str(), start, end, !seen);
        if segments.is_empty() {
            tracing::debug!(raw_identity = %raw_identity, "ignoring empty session");
            return Ok(segments);
        }
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO segments (raw_identity, start_time, end_time, duration, calendar_date, first_launch)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            for segment in &segments {
                stmt.execute(params![
                    segment.raw_identity,
                    segment.start_text(),
                    segment.end_text(),
                    segment.duration_secs(),
                    segment.date_text(),
                    segment.first_launch,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(
            raw_identity = %raw_identity,
            segments = segments.len(),
            first_launch = !seen,
            "recorded session"
        );
        Ok(segments)
    }

    /// Deletes the segment matching the raw identity and exact stored timestamps.
    ///
    /// Returns the number of rows removed; zero when nothing matched.
    pub fn delete_segment(
        &mut self,
        raw_identity: &RawIdentity,
        start_time: &str,
        end_time: &str,
    ) -> Result<usize, DbError> {
        let start_time = start_time.trim();
        let end_time = end_time.trim();
        parse_timestamp("start time", start_time)?;
        parse_timestamp("end time", end_time)?;
        let removed = self.conn.execute(
            "DELETE FROM segments WHERE raw_identity = ? AND start_time = ? AND end_time = ?",
            params![raw_identity.as_str(), start_time, end_time],
        )?;
        tracing::debug!(raw_identity = %raw_identity, removed, "deleted segment");
        Ok(removed)
    }

    /// Lists every stored segment ordered by start time then ID.
    pub fn list_segments(&self) -> Result<Vec<SegmentRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, raw_identity, start_time, end_time, duration, calendar_date, first_launch
            FROM segments
            ORDER BY start_time ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SegmentRecord {
                id: row.get(0)?,
                raw_identity: row.get(1)?,
                start_time: row.get(2)?,
                end_time: row.get(3)?,
                duration: row.get(4)?,
                calendar_date: row.get(5)?,
                first_launch: row.get::<_, Option<bool>>(6)?.unwrap_or(false),
            })
        })?;
        let mut segments = Vec::new();
        for row in rows {
            segments.push(row?);
        }
        Ok(segments)
    }

    /// Summarizes the ledger contents.
    pub fn status(&self) -> Result<LedgerStatus, DbError> {
        let schema_version = migrations::stored_version(&self.conn)?;
        let (segments, raw_identities, first_date, last_date) = self.conn.query_row(
            "
            SELECT COUNT(*), COUNT(DISTINCT raw_identity), MIN(calendar_date), MAX(calendar_date)
            FROM segments
            ",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )?;
        let display_mappings: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM display_mapping", [], |row| row.get(0))?;
        let (whitelist, blacklist): (i64, i64) = self.conn.query_row(
            "
            SELECT
                COALESCE(SUM(kind = 'whitelist'), 0),
                COALESCE(SUM(kind = 'blacklist'), 0)
            FROM filter_entries
            ",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(LedgerStatus {
            schema_version,
            segments,
            raw_identities,
            display_mappings,
            whitelist,
            blacklist,
            first_date,
            last_date,
        })
    }

    /// Returns true when any segment exists for the raw identity.
    pub fn has_segments(&self, raw_identity: &str) -> Result<bool, DbError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM segments WHERE raw_identity = ? LIMIT 1",
                [raw_identity],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{FixedOffset, NaiveDate, Utc};

    fn raw(name: &str) -> RawIdentity {
        RawIdentity::new(name).unwrap()
    }

    fn at(text: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(text).unwrap()
    }

    #[test]
    fn session_across_midnight_is_stored_as_two_segments() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let segments = db
            .record_session(
                &raw("X"),
                &at("2024-03-10T23:00:00+01:00"),
                &at("2024-03-11T01:30:00+01:00"),
            )
            .unwrap();
        assert_eq!(segments.len(), 2);

        let stored = db.list_segments().unwrap();
        let rows: Vec<(&str, &str, f64, &str, bool)> = stored
            .iter()
            .map(|s| {
                (
                    s.start_time.as_str(),
                    s.end_time.as_str(),
                    s.duration,
                    s.calendar_date.as_str(),
                    s.first_launch,
                )
            })
            .collect();
        assert_eq!(
            rows,
            vec![
                (
                    "2024-03-10T23:00:00+01:00",
                    "2024-03-11T00:00:00+01:00",
                    3600.0,
                    "2024-03-10",
                    true,
                ),
                (
                    "2024-03-11T00:00:00+01:00",
                    "2024-03-11T01:30:00+01:00",
                    5400.0,
                    "2024-03-11",
                    false,
                ),
            ]
        );
    }

    #[test]
    fn first_launch_only_for_new_identity() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.record_session(
            &raw("X"),
            &at("2024-03-10T10:00:00Z"),
            &at("2024-03-10T11:00:00Z"),
        )
        .unwrap();
        let second = db
            .record_session(
                &raw("X"),
                &at("2024-03-10T23:00:00Z"),
                &at("2024-03-11T01:00:00Z"),
            )
            .unwrap();
        assert!(second.iter().all(|segment| !segment.first_launch));

        let flagged = db
            .list_segments()
            .unwrap()
            .into_iter()
            .filter(|segment| segment.first_launch)
            .count();
        assert_eq!(flagged, 1);
    }

    #[test]
    fn empty_session_writes_nothing() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let start = at("2024-03-10T10:00:00Z");
        assert!(db.record_session(&raw("X"), &start, &start).unwrap().is_empty());
        assert!(!db.has_segments("X").unwrap());

        // the next real session is still the identity's first
        let segments = db
            .record_session(&raw("X"), &start, &at("2024-03-10T10:05:00Z"))
            .unwrap();
        assert!(segments[0].first_launch);
    }

    #[test]
    fn sessions_in_other_zones_keep_their_offset() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let start = Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2024, 3, 10)
                .unwrap()
                .and_hms_opt(23, 30, 0)
                .unwrap(),
        );
        let end = start + chrono::Duration::hours(1);
        db.record_session(&raw("X"), &start, &end).unwrap();
        let stored = db.list_segments().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].start_time, "2024-03-10T23:30:00+00:00");
        assert_eq!(stored[1].calendar_date, "2024-03-11");
    }

    #[test]
    fn delete_requires_exact_match() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.record_session(
            &raw("X"),
            &at("2024-03-10T10:00:00Z"),
            &at("2024-03-10T11:00:00Z"),
        )
        .unwrap();

        let removed = db
            .delete_segment(&raw("X"), "2024-03-10T10:00:00Z", "2024-03-10T11:00:00Z")
            .unwrap();
        assert_eq!(removed, 0, "stored text uses +00:00");

        let removed = db
            .delete_segment(
                &raw("X"),
                "2024-03-10T10:00:00+00:00",
                "2024-03-10T11:00:00+00:00",
            )
            .unwrap();
        assert_eq!(removed, 1);
        assert!(db.list_segments().unwrap().is_empty());
    }

    #[test]
    fn delete_rejects_malformed_timestamps() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let err = db
            .delete_segment(&raw("X"), "yesterday", "2024-03-10T11:00:00Z")
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[test]
    fn status_counts_contents() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let empty = db.status().unwrap();
        assert_eq!(empty.segments, 0);
        assert_eq!(empty.first_date, None);

        db.record_session(
            &raw("X"),
            &at("2024-03-10T23:00:00Z"),
            &at("2024-03-11T01:00:00Z"),
        )
        .unwrap();
        let status = db.status().unwrap();
        assert_eq!(status.schema_version, crate::CURRENT_VERSION);
        assert_eq!(status.segments, 2);
        assert_eq!(status.raw_identities, 1);
        assert_eq!(status.first_date.as_deref(), Some("2024-03-10"));
        assert_eq!(status.last_date.as_deref(), Some("2024-03-11"));
    }
}
