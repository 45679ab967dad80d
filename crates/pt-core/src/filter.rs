//! Whitelist/blacklist membership.

use std::collections::HashSet;

use crate::types::FilterKind;

/// An immutable view of both filter lists.
///
/// Matching is substring containment: an entry matches any candidate path that contains it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSnapshot {
    whitelist: HashSet<String>,
    blacklist: HashSet<String>,
}

impl FilterSnapshot {
    /// Builds a snapshot from the stored entry names.
    pub fn new<W, B>(whitelist: W, blacklist: B) -> Self
    where
        W: IntoIterator<Item = String>,
        B: IntoIterator<Item = String>,
    {
        Self {
            whitelist: whitelist.into_iter().collect(),
            blacklist: blacklist.into_iter().collect(),
        }
    }

    /// True iff some entry of `kind` is a substring of `path`.
    #[must_use]
    pub fn matches(&self, kind: FilterKind, path: &str) -> bool {
        self.entries(kind).iter().any(|entry| path.contains(entry.as_str()))
    }

    /// Tracking decision for a candidate path: never when blacklisted, otherwise only when
    /// whitelisted.
    #[must_use]
    pub fn should_track(&self, path: &str) -> bool {
        !self.matches(FilterKind::Blacklist, path) && self.matches(FilterKind::Whitelist, path)
    }

    /// Adds an entry. Returns false when it was already present.
    pub fn insert(&mut self, kind: FilterKind, name: &str) -> bool {
        self.entries_mut(kind).insert(name.to_string())
    }

    /// Removes an entry. Returns false when it was absent.
    pub fn remove(&mut self, kind: FilterKind, name: &str) -> bool {
        self.entries_mut(kind).remove(name)
    }

    /// Entry names of `kind`, sorted.
    #[must_use]
    pub fn names(&self, kind: FilterKind) -> Vec<String> {
        let mut names: Vec<String> = self.entries(kind).iter().cloned().collect();
        names.sort();
        names
    }

    const fn entries(&self, kind: FilterKind) -> &HashSet<String> {
        match kind {
            FilterKind::Whitelist => &self.whitelist,
            FilterKind::Blacklist => &self.blacklist,
        }
    }

    const fn entries_mut(&mut self, kind: FilterKind) -> &mut HashSet<String> {
        match kind {
            FilterKind::Whitelist => &mut self.whitelist,
            FilterKind::Blacklist => &mut self.blacklist,
        }
    }
}
