//! Raw-to-display identity resolution.

use pt_core::{DisplayName, ValidationError};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::{Database, DbError};

/// One `raw_identity -> display_name` alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMappingRecord {
    pub raw_identity: String,
    pub display_name: String,
}

/// What a rename changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenameOutcome {
    /// `from` was a display name; every mapping pointing at it now points at the target.
    Rebased { mappings: usize },
    /// `from` was treated as a raw identity and mapped directly.
    Mapped,
}

impl Database {
    /// Resolves a raw identity to its display name, defaulting to the raw identity itself.
    pub fn resolve(&self, raw_identity: &str) -> Result<String, DbError> {
        let display = self
            .conn
            .query_row(
                "SELECT display_name FROM display_mapping WHERE raw_identity = ?",
                [raw_identity],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(display.unwrap_or_else(|| raw_identity.to_string()))
    }

    /// Renames `from` to `to`.
    ///
    /// When some mappings already display as `from`, all of them are rebased onto `to`.
    /// Otherwise `from` is taken as a raw identity and mapped to `to`.
    pub fn rename(&mut self, from: &str, to: &DisplayName) -> Result<RenameOutcome, DbError> {
        let from = from.trim();
        if from.is_empty() {
            return Err(ValidationError::Empty {
                field: "rename source",
            }
            .into());
        }

        let tx = self.conn.transaction()?;
        let rebased = tx.execute(
            "UPDATE display_mapping SET display_name = ? WHERE display_name = ?",
            params![to.as_str(), from],
        )?;
        let outcome = if rebased > 0 {
            RenameOutcome::Rebased { mappings: rebased }
        } else {
            tx.execute(
                "
                INSERT INTO display_mapping (raw_identity, display_name)
                VALUES (?, ?)
                ON CONFLICT(raw_identity) DO UPDATE SET display_name = excluded.display_name
                ",
                params![from, to.as_str()],
            )?;
            RenameOutcome::Mapped
        };
        tx.commit()?;
        tracing::debug!(from, to = %to, ?outcome, "renamed identity");
        Ok(outcome)
    }

    /// Every raw identity currently mapped to `display_name`, sorted.
    pub fn originals_for(&self, display_name: &str) -> Result<Vec<String>, DbError> {
        Ok(originals_in(&self.conn, display_name)?)
    }

    /// All mappings ordered by raw identity.
    pub fn mappings(&self) -> Result<Vec<DisplayMappingRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT raw_identity, display_name
            FROM display_mapping
            ORDER BY raw_identity ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DisplayMappingRecord {
                raw_identity: row.get(0)?,
                display_name: row.get(1)?,
            })
        })?;
        let mut mappings = Vec::new();
        for row in rows {
            mappings.push(row?);
        }
        Ok(mappings)
    }
}

pub(crate) fn originals_in(
    conn: &Connection,
    display_name: &str,
) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "
        SELECT raw_identity
        FROM display_mapping
        WHERE display_name = ?
        ORDER BY raw_identity ASC
        ",
    )?;
    let rows = stmt.query_map([display_name], |row| row.get::<_, String>(0))?;
    let mut originals = Vec::new();
    for row in rows {
        originals.push(row?);
    }
    Ok(originals)
}
