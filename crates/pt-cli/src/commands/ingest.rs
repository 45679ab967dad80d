//! Ingest finished sessions from JSON lines.
//!
//! Each non-blank line is one `{"raw_identity", "start", "end"}` object, optionally with an
//! IANA `"zone"` to split the session in. Lines are parsed on the reading task and handed
//! to the recorder over its channel, so a tracker can pipe sessions in as processes exit.

use std::io::Write;

use anyhow::{Context, Result};
use pt_db::Database;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::recorder::{FinishedSession, Recorder, RecorderStats};

const CHANNEL_CAPACITY: usize = 64;

/// Lines read and rejected before reaching the recorder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadStats {
    pub lines: usize,
    pub rejected: usize,
}

/// Reads JSON lines from `reader` and sends each parsed session to `sender`.
pub async fn forward_lines<R: AsyncBufRead + Unpin>(
    reader: R,
    sender: mpsc::Sender<FinishedSession>,
) -> Result<ReadStats> {
    let mut stats = ReadStats::default();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        stats.lines += 1;
        match serde_json::from_str::<FinishedSession>(line) {
            Ok(session) => {
                if sender.send(session).await.is_err() {
                    anyhow::bail!("recorder stopped before input was consumed");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, line = stats.lines, "rejecting malformed session");
                stats.rejected += 1;
            }
        }
    }
    Ok(stats)
}

/// Records every session read from `reader` and returns the database when done.
pub async fn ingest<R: AsyncBufRead + Unpin>(
    db: Database,
    reader: R,
) -> Result<(Database, ReadStats, RecorderStats)> {
    let recorder = Recorder::spawn(db, CHANNEL_CAPACITY);
    let read = forward_lines(reader, recorder.sender()).await;
    let (db, recorded) = recorder
        .finish()
        .await
        .context("recorder task failed")?;
    Ok((db, read?, recorded))
}

pub fn run<W: Write>(writer: &mut W, db: Database) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let (_db, read, recorded) = runtime.block_on(ingest(db, stdin))?;

    writeln!(
        writer,
        "Recorded {} session(s) as {} segment(s).",
        recorded.sessions, recorded.segments
    )?;
    if read.rejected > 0 || recorded.failed > 0 {
        writeln!(
            writer,
            "Rejected {} malformed line(s); {} session(s) failed to record.",
            read.rejected, recorded.failed
        )?;
    }
    Ok(())
}
