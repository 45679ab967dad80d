//! Finished markers and first-launch overrides.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use pt_core::{DATE_FORMAT, DisplayName, parse_date};
use pt_db::{Database, FinishedChange, RenameOutcome};

#[derive(Debug, Args)]
pub struct FinishedArgs {
    /// Display name to mark.
    pub name: String,

    /// Finish date (YYYY-MM-DD). Without it the marker is toggled using today's date.
    #[arg(long, conflicts_with = "clear")]
    pub date: Option<String>,

    /// Remove the marker.
    #[arg(long)]
    pub clear: bool,
}

#[derive(Debug, Args)]
pub struct FirstLaunchArgs {
    /// Display name whose first-seen date is overridden.
    pub name: String,

    /// First-seen date (YYYY-MM-DD).
    pub date: String,
}

pub fn finished<W: Write>(
    writer: &mut W,
    db: &mut Database,
    args: &FinishedArgs,
    today: NaiveDate,
) -> Result<()> {
    let name = DisplayName::new(args.name.as_str())?;
    let change = if args.clear {
        FinishedChange::Clear
    } else if let Some(date) = &args.date {
        FinishedChange::On(parse_date("finish date", date)?)
    } else {
        FinishedChange::Toggle { today }
    };
    let state = db
        .set_finished(&name, change)
        .context("failed to update finished marker")?;
    match state {
        Some(date) => writeln!(writer, "{name} finished on {}", date.format(DATE_FORMAT))?,
        None => writeln!(writer, "{name} is not finished")?,
    }
    Ok(())
}

pub fn first_launch<W: Write>(writer: &mut W, db: &mut Database, args: &FirstLaunchArgs) -> Result<()> {
    let name = DisplayName::new(args.name.as_str())?;
    let date = parse_date("first-launch date", &args.date)?;
    db.set_first_launch_override(&name, date)
        .context("failed to set first-launch override")?;
    writeln!(writer, "{name} first seen on {}", date.format(DATE_FORMAT))?;
    Ok(())
}

pub fn rename<W: Write>(writer: &mut W, db: &mut Database, from: &str, to: &str) -> Result<()> {
    let to = DisplayName::new(to)?;
    let outcome = db.rename(from, &to).context("failed to rename")?;
    match outcome {
        RenameOutcome::Rebased { mappings } => {
            writeln!(writer, "Renamed {} to {to} ({mappings} mapping(s))", from.trim())?;
        }
        RenameOutcome::Mapped => {
            writeln!(writer, "Mapped {} to {to}", from.trim())?;
        }
    }
    Ok(())
}
