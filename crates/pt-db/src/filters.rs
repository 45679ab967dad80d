//! Whitelist/blacklist storage and the in-memory filter registry.

use std::sync::{Arc, PoisonError, RwLock};

use pt_core::{FilterKind, FilterSnapshot, ValidationError};
use rusqlite::params;

use crate::identity::originals_in;
use crate::{Database, DbError};

/// Whether a filter change adds or removes entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    Add,
    Remove,
}

impl Database {
    /// Adds or removes a filter entry.
    ///
    /// For the blacklist, when `name` is a display name the same change is applied to every
    /// raw identity mapped to it. Whitelist changes touch `name` only. Returns the entry
    /// names the change touched, `name` first.
    pub fn set_filter(
        &mut self,
        name: &str,
        kind: FilterKind,
        action: FilterAction,
    ) -> Result<Vec<String>, DbError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Empty {
                field: "filter name",
            }
            .into());
        }

        let tx = self.conn.transaction()?;
        let mut names = vec![name.to_string()];
        if kind == FilterKind::Blacklist {
            for original in originals_in(&tx, name)? {
                if !names.contains(&original) {
                    names.push(original);
                }
            }
        }
        {
            let mut stmt = match action {
                FilterAction::Add => {
                    tx.prepare("INSERT OR IGNORE INTO filter_entries (name, kind) VALUES (?, ?)")?
                }
                FilterAction::Remove => {
                    tx.prepare("DELETE FROM filter_entries WHERE name = ? AND kind = ?")?
                }
            };
            for entry in &names {
                stmt.execute(params![entry, kind.as_str()])?;
            }
        }
        tx.commit()?;
        tracing::debug!(name, %kind, ?action, entries = names.len(), "updated filter");
        Ok(names)
    }

    /// Entry names of one kind, sorted.
    pub fn filter_names(&self, kind: FilterKind) -> Result<Vec<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM filter_entries WHERE kind = ? ORDER BY name ASC")?;
        let rows = stmt.query_map([kind.as_str()], |row| row.get::<_, String>(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    /// Loads both lists as one snapshot.
    pub fn filter_snapshot(&self) -> Result<FilterSnapshot, DbError> {
        Ok(FilterSnapshot::new(
            self.filter_names(FilterKind::Whitelist)?,
            self.filter_names(FilterKind::Blacklist)?,
        ))
    }
}

/// Cached filter membership shared between readers.
///
/// Readers clone the current snapshot under a short read lock and test against it, so they
/// never observe a half-applied refresh. Writers go to storage first and then update the
/// cache under the write lock.
#[derive(Debug, Default)]
pub struct FilterRegistry {
    snapshot: RwLock<Arc<FilterSnapshot>>,
}

impl FilterRegistry {
    /// Builds a registry from the lists currently in storage.
    pub fn load(db: &Database) -> Result<Self, DbError> {
        Ok(Self {
            snapshot: RwLock::new(Arc::new(db.filter_snapshot()?)),
        })
    }

    /// Reloads both lists and installs them in one swap.
    pub fn refresh(&self, db: &Database) -> Result<(), DbError> {
        let fresh = Arc::new(db.filter_snapshot()?);
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = fresh;
        tracing::debug!("refreshed filter registry");
        Ok(())
    }

    /// Adds an entry (and the raw identities behind it) to storage, then to the cache.
    pub fn add(
        &self,
        db: &mut Database,
        name: &str,
        kind: FilterKind,
    ) -> Result<Vec<String>, DbError> {
        self.apply(db, name, kind, FilterAction::Add)
    }

    /// Removes an entry (and the raw identities behind it) from storage, then from the cache.
    pub fn remove(
        &self,
        db: &mut Database,
        name: &str,
        kind: FilterKind,
    ) -> Result<Vec<String>, DbError> {
        self.apply(db, name, kind, FilterAction::Remove)
    }

    fn apply(
        &self,
        db: &mut Database,
        name: &str,
        kind: FilterKind,
        action: FilterAction,
    ) -> Result<Vec<String>, DbError> {
        let names = db.set_filter(name, kind, action)?;
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let snapshot = Arc::make_mut(&mut guard);
        for entry in &names {
            match action {
                FilterAction::Add => snapshot.insert(kind, entry),
                FilterAction::Remove => snapshot.remove(kind, entry),
            };
        }
        Ok(names)
    }

    /// True iff some whitelist entry is a substring of `path`.
    pub fn is_whitelisted(&self, path: &str) -> bool {
        self.current().matches(FilterKind::Whitelist, path)
    }

    /// True iff some blacklist entry is a substring of `path`.
    pub fn is_blacklisted(&self, path: &str) -> bool {
        self.current().matches(FilterKind::Blacklist, path)
    }

    /// Whether tracking may start for `path`: never when blacklisted, otherwise only
    /// when whitelisted.
    pub fn should_track(&self, path: &str) -> bool {
        self.current().should_track(path)
    }

    /// Sorted entry names of one kind from the cache.
    pub fn names(&self, kind: FilterKind) -> Vec<String> {
        self.current().names(kind)
    }

    fn current(&self) -> Arc<FilterSnapshot> {
        Arc::clone(
            &self
                .snapshot
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}
