//! Finished markers and first-launch overrides.

use chrono::NaiveDate;
use pt_core::{DATE_FORMAT, DisplayName};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::{Database, DbError};

/// A display identity marked as finished.
///
/// `finished_at` is empty for markers created before finish dates were stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedMarker {
    pub display_name: String,
    #[serde(default)]
    pub finished_at: Option<String>,
}

/// A user-chosen first-seen date for a display identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstLaunchOverride {
    pub display_name: String,
    pub first_date: String,
}

/// Requested change to a finished marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishedChange {
    /// Mark finished on the given date, replacing any earlier date.
    On(NaiveDate),
    /// Clear an existing marker, or mark finished on `today` when there is none.
    Toggle { today: NaiveDate },
    /// Remove the marker.
    Clear,
}

impl Database {
    /// Applies a finished-marker change and returns the resulting finish date, if any.
    pub fn set_finished(
        &mut self,
        display_name: &DisplayName,
        change: FinishedChange,
    ) -> Result<Option<NaiveDate>, DbError> {
        let tx = self.conn.transaction()?;
        let marked: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM finished_markers WHERE display_name = ?)",
            [display_name.as_str()],
            |row| row.get(0),
        )?;
        let target = match change {
            FinishedChange::On(date) => Some(date),
            FinishedChange::Toggle { today } if !marked => Some(today),
            FinishedChange::Toggle { .. } | FinishedChange::Clear => None,
        };
        match target {
            Some(date) => {
                tx.execute(
                    "
                    INSERT INTO finished_markers (display_name, finished_at)
                    VALUES (?, ?)
                    ON CONFLICT(display_name) DO UPDATE SET finished_at = excluded.finished_at
                    ",
                    params![display_name.as_str(), date.format(DATE_FORMAT).to_string()],
                )?;
            }
            None => {
                tx.execute(
                    "DELETE FROM finished_markers WHERE display_name = ?",
                    [display_name.as_str()],
                )?;
            }
        }
        tx.commit()?;
        tracing::debug!(display_name = %display_name, ?target, "updated finished marker");
        Ok(target)
    }

    /// Returns the marker for a display name, if one exists.
    pub fn finished_marker(&self, display_name: &str) -> Result<Option<FinishedMarker>, DbError> {
        let marker = self
            .conn
            .query_row(
                "SELECT display_name, finished_at FROM finished_markers WHERE display_name = ?",
                [display_name],
                |row| {
                    Ok(FinishedMarker {
                        display_name: row.get(0)?,
                        finished_at: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(marker)
    }

    /// All finished markers ordered by display name.
    pub fn finished_markers(&self) -> Result<Vec<FinishedMarker>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT display_name, finished_at
            FROM finished_markers
            ORDER BY display_name ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(FinishedMarker {
                display_name: row.get(0)?,
                finished_at: row.get(1)?,
            })
        })?;
        let mut markers = Vec::new();
        for row in rows {
            markers.push(row?);
        }
        Ok(markers)
    }

    /// Sets the first-seen date of a display identity, replacing any earlier override.
    pub fn set_first_launch_override(
        &mut self,
        display_name: &DisplayName,
        first_date: NaiveDate,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO first_launch_overrides (display_name, first_date)
            VALUES (?, ?)
            ON CONFLICT(display_name) DO UPDATE SET first_date = excluded.first_date
            ",
            params![
                display_name.as_str(),
                first_date.format(DATE_FORMAT).to_string()
            ],
        )?;
        tracing::debug!(display_name = %display_name, %first_date, "set first launch override");
        Ok(())
    }

    /// All first-launch overrides ordered by display name.
    pub fn first_launch_overrides(&self) -> Result<Vec<FirstLaunchOverride>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT display_name, first_date
            FROM first_launch_overrides
            ORDER BY display_name ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(FirstLaunchOverride {
                display_name: row.get(0)?,
                first_date: row.get(1)?,
            })
        })?;
        let mut overrides = Vec::new();
        for row in rows {
            overrides.push(row?);
        }
        Ok(overrides)
    }
}
