//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::filter::FilterCommand;
use crate::commands::history::HistoryArgs;
use crate::commands::ledger::{DeleteArgs, RecordArgs};
use crate::commands::markers::{FinishedArgs, FirstLaunchArgs};
use crate::commands::report::{RangeArgs, SeriesArgs, TimelineArgs};
use crate::commands::transfer::{ExportArgs, ImportArgs};

/// Playtime activity ledger.
///
/// Records finished program sessions as day-bounded segments and reports where the
/// time went.
#[derive(Debug, Parser)]
#[command(name = "pt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record one finished session.
    Record(RecordArgs),

    /// Record finished sessions read as JSON lines from stdin.
    Ingest,

    /// Give a raw identity or an existing display name a new display name.
    Rename {
        /// Raw identity or current display name.
        from: String,
        /// New display name.
        to: String,
    },

    /// Manage the whitelist and blacklist.
    #[command(subcommand)]
    Filter(FilterCommand),

    /// Mark, toggle or clear the finished marker of a display identity.
    Finished(FinishedArgs),

    /// Override the first-seen date of a display identity.
    FirstLaunch(FirstLaunchArgs),

    /// Delete one stored segment by its exact timestamps.
    Delete(DeleteArgs),

    /// Total time per identity.
    Summary(RangeArgs),

    /// Bucketed time per identity.
    Series(SeriesArgs),

    /// Per-day totals with new and finished identities.
    Calendar(RangeArgs),

    /// Identities played in a period, flagged new or finished.
    Meta(RangeArgs),

    /// One day of activity as offsets from local midnight.
    Timeline(TimelineArgs),

    /// Sessions rebuilt from stored segments, newest first.
    History(HistoryArgs),

    /// Every identity seen, with filter flags.
    Known {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Write the whole ledger as JSON.
    Export(ExportArgs),

    /// Load a ledger export.
    Import(ImportArgs),

    /// Show ledger status.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}
