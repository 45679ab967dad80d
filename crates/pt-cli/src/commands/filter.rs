//! Whitelist and blacklist management.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Subcommand;
use pt_core::FilterKind;
use pt_db::{Database, FilterRegistry};

#[derive(Debug, Subcommand)]
pub enum FilterCommand {
    /// Add a name to a list. A display name also adds every raw identity behind it.
    Add {
        /// whitelist or blacklist.
        kind: FilterKind,
        name: String,
    },

    /// Remove a name from a list, together with the raw identities behind it.
    Remove {
        /// whitelist or blacklist.
        kind: FilterKind,
        name: String,
    },

    /// Show list entries.
    List {
        /// Only this list.
        #[arg(long)]
        kind: Option<FilterKind>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check whether a program path would be tracked.
    Check {
        /// Full program path or executable name.
        path: String,
    },
}

pub fn run<W: Write>(writer: &mut W, db: &mut Database, command: &FilterCommand) -> Result<()> {
    let registry = FilterRegistry::load(db).context("failed to load filters")?;
    match command {
        FilterCommand::Add { kind, name } => {
            let touched = registry.add(db, name, *kind).context("failed to add filter")?;
            writeln!(writer, "Added to {kind}: {}", touched.join(", "))?;
        }
        FilterCommand::Remove { kind, name } => {
            let touched = registry
                .remove(db, name, *kind)
                .context("failed to remove filter")?;
            writeln!(writer, "Removed from {kind}: {}", touched.join(", "))?;
        }
        FilterCommand::List { kind, json } => {
            let kinds = kind.map_or_else(
                || vec![FilterKind::Whitelist, FilterKind::Blacklist],
                |kind| vec![kind],
            );
            if *json {
                let mut output = serde_json::Map::new();
                for kind in kinds {
                    output.insert(kind.to_string(), registry.names(kind).into());
                }
                writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
            } else {
                for kind in kinds {
                    let names = registry.names(kind);
                    writeln!(writer, "{} ({})", kind.as_str().to_uppercase(), names.len())?;
                    for name in names {
                        writeln!(writer, "  {name}")?;
                    }
                }
            }
        }
        FilterCommand::Check { path } => {
            let verdict = if registry.is_blacklisted(path) {
                "blacklisted"
            } else if registry.should_track(path) {
                "tracked"
            } else {
                "not whitelisted"
            };
            writeln!(writer, "{path}: {verdict}")?;
        }
    }
    Ok(())
}
