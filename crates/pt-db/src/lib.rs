//! Storage layer for the playtime activity ledger.
//!
//! Provides persistence for day-bounded activity segments and the metadata around them
//! (display names, filters, finished markers, first-launch overrides) using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` can be moved to a dedicated recorder task but not shared across threads
//! without external synchronization. The [`FilterRegistry`] is `Sync` and is the only
//! piece of shared in-memory state.
//!
//! # Schema
//!
//! The schema is versioned. [`Database::open`] brings any older ledger up to
//! [`CURRENT_VERSION`] before returning; see [`migrations`] for the chain.
//!
//! ## Timestamp Format
//!
//! Segment timestamps are stored as TEXT in RFC 3339 with whole seconds and the offset of
//! the zone the session was recorded in (e.g., `2024-03-10T23:00:00+01:00`). The first ten
//! characters are the local calendar date, which is what `calendar_date` holds.
//!
//! Durations are written as INTEGER seconds. Ledgers written by older builds may hold REAL
//! values, so they are always read back as `f64`.

use std::path::Path;

use pt_core::ValidationError;
use rusqlite::Connection;
use thiserror::Error;

pub mod analytics;
pub mod filters;
pub mod history;
pub mod identity;
pub mod ledger;
pub mod markers;
pub mod migrations;
pub mod transfer;

pub use analytics::{CalendarDay, DayTimeline, GameMeta, KnownIdentity, SeriesMatrix, SummaryItem};
pub use filters::{FilterAction, FilterRegistry};
pub use identity::{DisplayMappingRecord, RenameOutcome};
pub use ledger::{LedgerStatus, SegmentRecord};
pub use markers::{FinishedChange, FinishedMarker, FirstLaunchOverride};
pub use migrations::CURRENT_VERSION;
pub use transfer::{ExportMeta, ExportedSegment, ImportMode, ImportStats, LedgerExport};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Input rejected before reaching storage.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A schema migration step failed and was rolled back.
    #[error("migration to version {version} ({name}) failed: {source}")]
    Migration {
        version: i64,
        name: &'static str,
        #[source]
        source: Box<DbError>,
    },
    /// The ledger was written by a newer build.
    #[error("ledger schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: i64, supported: i64 },
    /// An export payload could not be read or written.
    #[error("invalid export payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// New files get the current schema directly; existing ledgers are migrated.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let mut db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&mut self) -> Result<(), DbError> {
        migrations::migrate(&mut self.conn)
    }

    /// Returns the stored schema version.
    pub fn schema_version(&self) -> Result<i64, DbError> {
        migrations::stored_version(&self.conn)
    }
}
