//! Recorder task that owns the ledger while finished sessions stream in.
//!
//! Producers send [`FinishedSession`] messages over a bounded channel; one blocking task
//! drains the channel and records each session in arrival order. Dropping every sender ends
//! the task, which hands the database back together with its counters.

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use pt_core::{ActivitySegment, RawIdentity};
use pt_db::{Database, DbError};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

/// A process-exited notification.
///
/// Without `zone` the session is split at midnights of the offset `start` carries, which
/// drifts by an hour across a daylight-saving change. Producers that know their IANA zone
/// should send it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FinishedSession {
    pub raw_identity: RawIdentity,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    #[serde(default)]
    pub zone: Option<Tz>,
}

impl FinishedSession {
    fn record(&self, db: &mut Database) -> Result<Vec<ActivitySegment>, DbError> {
        match self.zone {
            Some(tz) => db.record_session(
                &self.raw_identity,
                &self.start.with_timezone(&tz),
                &self.end.with_timezone(&tz),
            ),
            None => db.record_session(&self.raw_identity, &self.start, &self.end),
        }
    }
}

/// What the recorder did before it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecorderStats {
    pub sessions: usize,
    pub segments: usize,
    pub failed: usize,
}

/// Handle to a running recorder task.
pub struct Recorder {
    sender: mpsc::Sender<FinishedSession>,
    handle: JoinHandle<(Database, RecorderStats)>,
}

impl Recorder {
    /// Moves `db` into a new recorder task. Must be called inside a tokio runtime.
    pub fn spawn(db: Database, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<FinishedSession>(capacity.max(1));
        let handle = tokio::task::spawn_blocking(move || {
            let mut db = db;
            let mut stats = RecorderStats::default();
            while let Some(session) = receiver.blocking_recv() {
                match session.record(&mut db) {
                    Ok(segments) => {
                        stats.sessions += 1;
                        stats.segments += segments.len();
                    }
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            raw_identity = %session.raw_identity,
                            "failed to record session"
                        );
                        stats.failed += 1;
                    }
                }
            }
            tracing::debug!(?stats, "recorder stopped");
            (db, stats)
        });
        Self { sender, handle }
    }

    /// A new sender for producers.
    pub fn sender(&self) -> mpsc::Sender<FinishedSession> {
        self.sender.clone()
    }

    /// Closes this handle's sender and waits for queued sessions to be recorded.
    ///
    /// Senders handed out by [`Recorder::sender`] must be dropped first.
    pub async fn finish(self) -> Result<(Database, RecorderStats), JoinError> {
        drop(self.sender);
        self.handle.await
    }
}
