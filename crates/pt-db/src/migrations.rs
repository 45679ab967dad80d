//! Schema versions and the migration chain.
//!
//! A ledger with no `segments` table is new and receives the current layout stamped with
//! [`CURRENT_VERSION`]. Any other ledger is brought forward one step at a time; each step
//! runs in its own transaction together with its version bump, so a failed step leaves the
//! stored version untouched and is retried on the next open.
//!
//! The oldest supported layout (version 0) is
//! `segments(id, raw_identity, window_title, start_time, end_time, duration, calendar_date)`
//! plus `schema_version(version)`.

use chrono::DateTime;
use pt_core::segment_session;
use rusqlite::{Connection, OptionalExtension, Transaction, params};

use crate::DbError;

/// Schema version written by this build.
pub const CURRENT_VERSION: i64 = 8;

struct Migration {
    version: i64,
    name: &'static str,
    apply: fn(&Transaction<'_>) -> Result<(), DbError>,
}

const MIGRATIONS: [Migration; 8] = [
    Migration {
        version: 1,
        name: "segments_first_launch",
        apply: add_first_launch,
    },
    Migration {
        version: 2,
        name: "filter_entries",
        apply: create_filter_entries,
    },
    Migration {
        version: 3,
        name: "display_mapping",
        apply: create_display_mapping,
    },
    Migration {
        version: 4,
        name: "finished_markers",
        apply: create_finished_markers,
    },
    Migration {
        version: 5,
        name: "finished_markers_date",
        apply: add_finished_at,
    },
    Migration {
        version: 6,
        name: "first_launch_overrides",
        apply: create_first_launch_overrides,
    },
    Migration {
        version: 7,
        name: "segment_indexes",
        apply: create_segment_indexes,
    },
    Migration {
        version: 8,
        name: "historical_segmentation",
        apply: split_historical_segments,
    },
];

const CURRENT_SCHEMA: &str = "
    -- Segments: day-bounded intervals of activity
    -- start_time/end_time: RFC 3339 with the recording zone's offset
    -- calendar_date: YYYY-MM-DD local date of start_time
    CREATE TABLE IF NOT EXISTS segments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        raw_identity TEXT NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        duration INTEGER NOT NULL,
        calendar_date TEXT NOT NULL,
        first_launch BOOLEAN DEFAULT FALSE
    );

    CREATE INDEX IF NOT EXISTS idx_segments_date ON segments(calendar_date);
    CREATE INDEX IF NOT EXISTS idx_segments_unique ON segments(raw_identity, start_time, end_time);

    CREATE TABLE IF NOT EXISTS filter_entries (
        name TEXT NOT NULL,
        kind TEXT NOT NULL CHECK (kind IN ('whitelist', 'blacklist')),
        PRIMARY KEY (name, kind)
    );

    CREATE TABLE IF NOT EXISTS display_mapping (
        raw_identity TEXT PRIMARY KEY,
        display_name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS finished_markers (
        display_name TEXT PRIMARY KEY,
        finished_at TEXT
    );

    CREATE TABLE IF NOT EXISTS first_launch_overrides (
        display_name TEXT PRIMARY KEY,
        first_date TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    );
";

/// Brings the ledger behind `conn` to [`CURRENT_VERSION`].
pub(crate) fn migrate(conn: &mut Connection) -> Result<(), DbError> {
    if !table_exists(conn, "segments")? {
        let tx = conn.transaction()?;
        tx.execute_batch(CURRENT_SCHEMA)?;
        write_version(&tx, CURRENT_VERSION)?;
        tx.commit()?;
        tracing::info!(version = CURRENT_VERSION, "initialized ledger schema");
        return Ok(());
    }

    if !table_exists(conn, "schema_version")? {
        conn.execute_batch("CREATE TABLE schema_version (version INTEGER NOT NULL);")?;
    }
    let stored = stored_version(conn)?;
    if stored > CURRENT_VERSION {
        return Err(DbError::UnsupportedVersion {
            found: stored,
            supported: CURRENT_VERSION,
        });
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > stored) {
        apply_step(conn, migration).map_err(|source| DbError::Migration {
            version: migration.version,
            name: migration.name,
            source: Box::new(source),
        })?;
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "applied schema migration"
        );
    }
    Ok(())
}

fn apply_step(conn: &mut Connection, migration: &Migration) -> Result<(), DbError> {
    let tx = conn.transaction()?;
    (migration.apply)(&tx)?;
    write_version(&tx, migration.version)?;
    tx.commit()?;
    Ok(())
}

/// Reads the stored version; a missing record counts as version 0.
pub(crate) fn stored_version(conn: &Connection) -> Result<i64, DbError> {
    let version = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i64>>(0)
        })
        .optional()?
        .flatten();
    Ok(version.unwrap_or(0))
}

fn write_version(conn: &Connection, version: i64) -> Result<(), DbError> {
    let updated = conn.execute("UPDATE schema_version SET version = ?", [version])?;
    if updated == 0 {
        conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, DbError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, DbError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for row in rows {
        if row? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn add_first_launch(tx: &Transaction<'_>) -> Result<(), DbError> {
    if has_column(tx, "segments", "window_title")? {
        tx.execute_batch("ALTER TABLE segments DROP COLUMN window_title;")?;
    }
    if !has_column(tx, "segments", "first_launch")? {
        tx.execute_batch("ALTER TABLE segments ADD COLUMN first_launch BOOLEAN DEFAULT FALSE;")?;
    }
    Ok(())
}

fn create_filter_entries(tx: &Transaction<'_>) -> Result<(), DbError> {
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS filter_entries (
            name TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('whitelist', 'blacklist')),
            PRIMARY KEY (name, kind)
        );
        ",
    )?;
    Ok(())
}

fn create_display_mapping(tx: &Transaction<'_>) -> Result<(), DbError> {
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS display_mapping (
            raw_identity TEXT PRIMARY KEY,
            display_name TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

fn create_finished_markers(tx: &Transaction<'_>) -> Result<(), DbError> {
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS finished_markers (
            display_name TEXT PRIMARY KEY
        );
        ",
    )?;
    Ok(())
}

fn add_finished_at(tx: &Transaction<'_>) -> Result<(), DbError> {
    if !has_column(tx, "finished_markers", "finished_at")? {
        tx.execute_batch("ALTER TABLE finished_markers ADD COLUMN finished_at TEXT;")?;
    }
    Ok(())
}

fn create_first_launch_overrides(tx: &Transaction<'_>) -> Result<(), DbError> {
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS first_launch_overrides (
            display_name TEXT PRIMARY KEY,
            first_date TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

fn create_segment_indexes(tx: &Transaction<'_>) -> Result<(), DbError> {
    tx.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_segments_date ON segments(calendar_date);
        CREATE INDEX IF NOT EXISTS idx_segments_unique ON segments(raw_identity, start_time, end_time);
        ",
    )?;
    Ok(())
}

#[derive(Debug)]
struct LegacyRow {
    id: i64,
    raw_identity: String,
    start_time: String,
    end_time: String,
    first_launch: bool,
}

/// Rewrites rows that span a local midnight, or whose stored date disagrees with their
/// start, into day-bounded segments in each row's own offset.
fn split_historical_segments(tx: &Transaction<'_>) -> Result<(), DbError> {
    let rows = {
        let mut stmt = tx.prepare(
            "
            SELECT id, raw_identity, start_time, end_time, first_launch
            FROM segments
            WHERE substr(start_time, 1, 10) != substr(end_time, 1, 10)
               OR calendar_date != substr(start_time, 1, 10)
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(LegacyRow {
                id: row.get(0)?,
                raw_identity: row.get(1)?,
                start_time: row.get(2)?,
                end_time: row.get(3)?,
                first_launch: row.get::<_, Option<bool>>(4)?.unwrap_or(false),
            })
        })?;
        let mut legacy = Vec::new();
        for row in rows {
            legacy.push(row?);
        }
        legacy
    };

    let mut insert = tx.prepare(
        "
        INSERT INTO segments (raw_identity, start_time, end_time, duration, calendar_date, first_launch)
        VALUES (?, ?, ?, ?, ?, ?)
        ",
    )?;
    let mut delete = tx.prepare("DELETE FROM segments WHERE id = ?")?;
    let mut rewritten = 0_usize;
    for row in rows {
        let parsed = (
            DateTime::parse_from_rfc3339(&row.start_time),
            DateTime::parse_from_rfc3339(&row.end_time),
        );
        let (Ok(start), Ok(end)) = parsed else {
            tracing::warn!(
                id = row.id,
                start = %row.start_time,
                end = %row.end_time,
                "skipping legacy segment with unparsable timestamps"
            );
            continue;
        };
        if end <= start {
            tracing::warn!(id = row.id, "skipping legacy segment with non-positive span");
            continue;
        }

        for segment in segment_session(&row.raw_identity, &start, &end, row.first_launch) {
            insert.execute(params![
                segment.raw_identity,
                segment.start_text(),
                segment.end_text(),
                segment.duration_secs(),
                segment.date_text(),
                segment.first_launch,
            ])?;
        }
        delete.execute([row.id])?;
        rewritten += 1;
    }
    tracing::debug!(rewritten, "historical segmentation finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    const LEGACY_V0: &str = "
        CREATE TABLE segments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            raw_identity TEXT NOT NULL,
            window_title TEXT,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            duration INTEGER NOT NULL,
            calendar_date TEXT NOT NULL
        );
        CREATE TABLE schema_version (version INTEGER NOT NULL);
        INSERT INTO schema_version (version) VALUES (0);
    ";

    fn legacy_connection() -> Connection {
        let conn = Connection::open_in_memory().expect("open legacy db");
        conn.execute_batch(LEGACY_V0).expect("legacy schema");
        conn
    }

    fn insert_legacy(conn: &Connection, raw: &str, start: &str, end: &str, date: &str) {
        conn.execute(
            "
            INSERT INTO segments (raw_identity, window_title, start_time, end_time, duration, calendar_date)
            VALUES (?, 'title', ?, ?, 0, ?)
            ",
            params![raw, start, end, date],
        )
        .expect("insert legacy row");
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }

    fn segment_rows(conn: &Connection) -> Vec<(String, String, String, i64, String, bool)> {
        let mut stmt = conn
            .prepare(
                "
                SELECT raw_identity, start_time, end_time, duration, calendar_date, first_launch
                FROM segments
                ORDER BY start_time ASC, raw_identity ASC
                ",
            )
            .expect("prepare segments");
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })
            .expect("query segments");
        rows.map(|row| row.expect("segment row")).collect()
    }

    #[test]
    fn fresh_database_gets_current_layout() {
        let db = Database::open_in_memory().expect("open in-memory db");
        assert_eq!(db.schema_version().unwrap(), CURRENT_VERSION);
        assert_eq!(
            table_columns(&db.conn, "segments"),
            vec![
                "id",
                "raw_identity",
                "start_time",
                "end_time",
                "duration",
                "calendar_date",
                "first_launch",
            ]
        );
        assert_eq!(
            table_columns(&db.conn, "finished_markers"),
            vec!["display_name", "finished_at"]
        );
    }

    #[test]
    fn legacy_ledger_reaches_current_layout() {
        let mut conn = legacy_connection();
        migrate(&mut conn).expect("migrate");
        assert_eq!(stored_version(&conn).unwrap(), CURRENT_VERSION);

        let fresh = Database::open_in_memory().expect("open in-memory db");
        for table in [
            "segments",
            "filter_entries",
            "display_mapping",
            "finished_markers",
            "first_launch_overrides",
        ] {
            assert_eq!(
                table_columns(&conn, table),
                table_columns(&fresh.conn, table),
                "columns of {table}"
            );
        }
    }

    #[test]
    fn historical_rows_are_split_at_local_midnight() {
        let mut conn = legacy_connection();
        insert_legacy(
            &conn,
            "X",
            "2024-03-10T23:00:00+01:00",
            "2024-03-11T01:30:00+01:00",
            "2024-03-10",
        );
        insert_legacy(
            &conn,
            "Y",
            "2024-03-12T10:00:00+01:00",
            "2024-03-12T11:00:00+01:00",
            "2024-03-12",
        );
        migrate(&mut conn).expect("migrate");

        let rows = segment_rows(&conn);
        assert_eq!(
            rows,
            vec![
                (
                    "X".to_string(),
                    "2024-03-10T23:00:00+01:00".to_string(),
                    "2024-03-11T00:00:00+01:00".to_string(),
                    3600,
                    "2024-03-10".to_string(),
                    false,
                ),
                (
                    "X".to_string(),
                    "2024-03-11T00:00:00+01:00".to_string(),
                    "2024-03-11T01:30:00+01:00".to_string(),
                    5400,
                    "2024-03-11".to_string(),
                    false,
                ),
                (
                    "Y".to_string(),
                    "2024-03-12T10:00:00+01:00".to_string(),
                    "2024-03-12T11:00:00+01:00".to_string(),
                    0,
                    "2024-03-12".to_string(),
                    false,
                ),
            ]
        );
    }

    #[test]
    fn mismatched_calendar_date_is_corrected() {
        let mut conn = legacy_connection();
        insert_legacy(
            &conn,
            "X",
            "2024-03-10T10:00:00Z",
            "2024-03-10T11:00:00Z",
            "2024-03-09",
        );
        migrate(&mut conn).expect("migrate");
        let rows = segment_rows(&conn);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, "2024-03-10T10:00:00+00:00");
        assert_eq!(rows[0].3, 3600);
        assert_eq!(rows[0].4, "2024-03-10");
    }

    #[test]
    fn first_launch_stays_on_first_piece_only() {
        let mut conn = Connection::open_in_memory().expect("open db");
        conn.execute_batch(CURRENT_SCHEMA).expect("schema");
        write_version(&conn, 7).expect("stamp 7");
        conn.execute(
            "
            INSERT INTO segments (raw_identity, start_time, end_time, duration, calendar_date, first_launch)
            VALUES ('X', '2024-03-10T22:00:00Z', '2024-03-12T02:00:00Z', 187200, '2024-03-10', 1)
            ",
            [],
        )
        .expect("insert");
        migrate(&mut conn).expect("migrate");

        let flags: Vec<bool> = segment_rows(&conn).into_iter().map(|row| row.5).collect();
        assert_eq!(flags, vec![true, false, false]);
    }

    #[test]
    fn unparsable_legacy_rows_are_left_untouched() {
        let mut conn = legacy_connection();
        insert_legacy(&conn, "X", "yesterday", "today", "2024-03-10");
        insert_legacy(
            &conn,
            "Y",
            "2024-03-11T10:00:00Z",
            "2024-03-10T10:00:00Z",
            "2024-03-11",
        );
        migrate(&mut conn).expect("migrate");
        let rows = segment_rows(&conn);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|row| row.1 == "yesterday"));
        assert_eq!(stored_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn running_migrations_twice_is_idempotent() {
        let mut conn = legacy_connection();
        insert_legacy(
            &conn,
            "X",
            "2024-03-10T23:00:00+01:00",
            "2024-03-11T01:30:00+01:00",
            "2024-03-10",
        );
        migrate(&mut conn).expect("first migrate");
        let first = segment_rows(&conn);
        migrate(&mut conn).expect("second migrate");
        assert_eq!(segment_rows(&conn), first);
        assert_eq!(stored_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn failed_step_rolls_back_and_keeps_version() {
        let mut conn = legacy_connection();
        insert_legacy(
            &conn,
            "X",
            "2024-03-10T23:00:00+01:00",
            "2024-03-11T01:30:00+01:00",
            "2024-03-10",
        );
        conn.execute_batch(
            "
            CREATE TRIGGER refuse_inserts BEFORE INSERT ON segments
            BEGIN
                SELECT RAISE(ABORT, 'inserts refused');
            END;
            ",
        )
        .expect("create trigger");

        let err = migrate(&mut conn).expect_err("rewrite must fail");
        assert!(matches!(err, DbError::Migration { version: 8, .. }));
        assert_eq!(stored_version(&conn).unwrap(), 7);
        let rows = segment_rows(&conn);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].2, "2024-03-11T01:30:00+01:00");

        conn.execute_batch("DROP TRIGGER refuse_inserts;")
            .expect("drop trigger");
        migrate(&mut conn).expect("retry");
        assert_eq!(stored_version(&conn).unwrap(), CURRENT_VERSION);
        assert_eq!(segment_rows(&conn).len(), 2);
    }

    #[test]
    fn newer_version_is_rejected() {
        let mut conn = legacy_connection();
        conn.execute("UPDATE schema_version SET version = 99", [])
            .expect("bump");
        let err = migrate(&mut conn).expect_err("must reject");
        assert!(matches!(
            err,
            DbError::UnsupportedVersion {
                found: 99,
                supported: CURRENT_VERSION
            }
        ));
    }

    #[test]
    fn missing_version_record_counts_as_zero() {
        let mut conn = Connection::open_in_memory().expect("open db");
        conn.execute_batch(
            "
            CREATE TABLE segments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                raw_identity TEXT NOT NULL,
                window_title TEXT,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                duration INTEGER NOT NULL,
                calendar_date TEXT NOT NULL
            );
            ",
        )
        .expect("legacy segments");
        migrate(&mut conn).expect("migrate");
        assert_eq!(stored_version(&conn).unwrap(), CURRENT_VERSION);
        assert!(has_column(&conn, "segments", "first_launch").unwrap());
    }
}
