//! Session history rebuilt from stored segments.

use chrono::{DateTime, Utc};
use pt_core::{HistoryEntry, merge_contiguous};

use crate::{Database, DbError};

impl Database {
    /// Returns the activity history, newest first.
    ///
    /// Segments are resolved to display names and flagged as finished or blacklisted;
    /// back-to-back segments of one identity are merged into a single entry. With
    /// `hide_blacklisted`, blacklisted rows are dropped before merging.
    pub fn history(&self, hide_blacklisted: bool) -> Result<Vec<HistoryEntry>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT COALESCE(m.display_name, s.raw_identity) AS name,
                   s.raw_identity,
                   s.calendar_date,
                   s.start_time,
                   s.end_time,
                   s.duration,
                   EXISTS (
                       SELECT 1 FROM finished_markers fm
                       WHERE fm.display_name = COALESCE(m.display_name, s.raw_identity)
                   ),
                   EXISTS (
                       SELECT 1 FROM filter_entries bx
                       WHERE bx.kind = 'blacklist'
                         AND (bx.name = s.raw_identity OR bx.name = COALESCE(m.display_name, s.raw_identity))
                   )
            FROM segments s
            LEFT JOIN display_mapping m ON m.raw_identity = s.raw_identity
            ORDER BY s.start_time ASC, s.id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(HistoryEntry {
                name: row.get(0)?,
                original: row.get(1)?,
                date: row.get(2)?,
                start_time: row.get(3)?,
                end_time: row.get(4)?,
                seconds: row.get(5)?,
                finished: row.get(6)?,
                blacklisted: row.get(7)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            let entry = row?;
            if hide_blacklisted && entry.blacklisted {
                continue;
            }
            entries.push(entry);
        }

        // Offsets differ between rows, so text order is not instant order. Unparsable legacy
        // rows sort first, by text.
        entries.sort_by_cached_key(|entry| {
            (
                DateTime::parse_from_rfc3339(&entry.start_time)
                    .ok()
                    .map(|start| start.with_timezone(&Utc)),
                entry.start_time.clone(),
            )
        });
        Ok(merge_contiguous(entries))
    }
}
