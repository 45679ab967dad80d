//! Session history and the list of known identities.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use pt_db::Database;

use super::util::{format_duration, truncate_name};

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Leave out blacklisted sessions.
    #[arg(long, conflicts_with = "show_blacklisted")]
    pub hide_blacklisted: bool,

    /// Include blacklisted sessions even when the config hides them.
    #[arg(long)]
    pub show_blacklisted: bool,

    /// Show at most this many sessions.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

impl HistoryArgs {
    const fn hide(&self, default: bool) -> bool {
        if self.hide_blacklisted {
            true
        } else if self.show_blacklisted {
            false
        } else {
            default
        }
    }
}

pub fn history<W: Write>(
    writer: &mut W,
    db: &Database,
    args: &HistoryArgs,
    hide_by_default: bool,
) -> Result<()> {
    let mut entries = db
        .history(args.hide(hide_by_default))
        .context("failed to build history")?;
    if let Some(limit) = args.limit {
        entries.truncate(limit);
    }
    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&entries)?)?;
        return Ok(());
    }

    if entries.is_empty() {
        writeln!(writer, "No sessions recorded.")?;
        return Ok(());
    }
    for entry in &entries {
        let mut flags = Vec::new();
        if entry.finished {
            flags.push("finished");
        }
        if entry.blacklisted {
            flags.push("blacklisted");
        }
        let line = format!(
            "{}  {:<24}  {:>8}  {} -> {}  {}",
            entry.date,
            truncate_name(&entry.name, 24),
            format_duration(entry.seconds),
            entry.start_time,
            entry.end_time,
            flags.join(", ")
        );
        writeln!(writer, "{}", line.trim_end())?;
    }
    Ok(())
}

pub fn known<W: Write>(writer: &mut W, db: &Database, json: bool) -> Result<()> {
    let identities = db
        .known_identities()
        .context("failed to list identities")?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&identities)?)?;
        return Ok(());
    }

    if identities.is_empty() {
        writeln!(writer, "No identities recorded.")?;
        return Ok(());
    }
    writeln!(
        writer,
        "{:<24}  {:<24}  {:>8}  Lists",
        "Name", "Original", "Sessions"
    )?;
    for identity in &identities {
        let mut lists = Vec::new();
        if identity.whitelisted {
            lists.push("whitelist");
        }
        if identity.blacklisted {
            lists.push("blacklist");
        }
        let line = format!(
            "{:<24}  {:<24}  {:>8}  {}",
            truncate_name(&identity.name, 24),
            truncate_name(&identity.original, 24),
            identity.sessions,
            lists.join(", ")
        );
        writeln!(writer, "{}", line.trim_end())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, FixedOffset};
    use insta::assert_snapshot;
    use pt_core::{DisplayName, FilterKind, RawIdentity};
    use pt_db::FilterAction;

    fn record(db: &mut Database, raw: &str, start: &str, end: &str) {
        let start: DateTime<FixedOffset> = DateTime::parse_from_rfc3339(start).unwrap();
        let end: DateTime<FixedOffset> = DateTime::parse_from_rfc3339(end).unwrap();
        db.record_session(&RawIdentity::new(raw).unwrap(), &start, &end)
            .unwrap();
    }

    fn sample() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        record(
            &mut db,
            "hades.exe",
            "2024-03-10T23:00:00+01:00",
            "2024-03-11T01:30:00+01:00",
        );
        record(
            &mut db,
            "launcher.exe",
            "2024-03-11T09:00:00+01:00",
            "2024-03-11T09:05:00+01:00",
        );
        db.rename("hades.exe", &DisplayName::new("Hades").unwrap())
            .unwrap();
        db.set_filter("launcher.exe", FilterKind::Blacklist, FilterAction::Add)
            .unwrap();
        db
    }

    fn args(hide: bool, show: bool) -> HistoryArgs {
        HistoryArgs {
            hide_blacklisted: hide,
            show_blacklisted: show,
            limit: None,
            json: false,
        }
    }

    #[test]
    fn history_table_merges_midnight_split() {
        let db = sample();
        let mut output = Vec::new();
        history(&mut output, &db, &args(false, false), false).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        2024-03-11  launcher.exe                    5m  2024-03-11T09:00:00+01:00 -> 2024-03-11T09:05:00+01:00  blacklisted
        2024-03-10  Hades                       2h 30m  2024-03-10T23:00:00+01:00 -> 2024-03-11T01:30:00+01:00
        ");
    }

    #[test]
    fn flags_override_configured_default() {
        let db = sample();
        let mut output = Vec::new();
        history(&mut output, &db, &args(false, false), true).unwrap();
        assert_eq!(String::from_utf8(output).unwrap().lines().count(), 1);

        let mut output = Vec::new();
        history(&mut output, &db, &args(false, true), true).unwrap();
        assert_eq!(String::from_utf8(output).unwrap().lines().count(), 2);
    }

    #[test]
    fn known_table() {
        let db = sample();
        let mut output = Vec::new();
        known(&mut output, &db, false).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Name                      Original                  Sessions  Lists
        Hades                     hades.exe                        2
        launcher.exe              launcher.exe                     1  blacklist
        ");
    }
}
