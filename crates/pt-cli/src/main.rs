use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pt_cli::commands::{filter, history, ingest, ledger, markers, report, transfer, util};
use pt_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(pt_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = pt_db::Database::open(&config.database_path).with_context(|| {
        format!("failed to open {}", config.database_path.display())
    })?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init so tests that already installed a subscriber don't panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (mut db, config) = open_database(cli.config.as_deref())?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let today = util::today();

    match command {
        Commands::Record(args) => ledger::record(&mut out, &mut db, args)?,
        Commands::Ingest => ingest::run(&mut out, db)?,
        Commands::Rename { from, to } => markers::rename(&mut out, &mut db, from, to)?,
        Commands::Filter(action) => filter::run(&mut out, &mut db, action)?,
        Commands::Finished(args) => markers::finished(&mut out, &mut db, args, today)?,
        Commands::FirstLaunch(args) => markers::first_launch(&mut out, &mut db, args)?,
        Commands::Delete(args) => ledger::delete(&mut out, &mut db, args)?,
        Commands::Summary(args) => report::summary(&mut out, &db, args, today)?,
        Commands::Series(args) => report::series(&mut out, &db, args, today)?,
        Commands::Calendar(args) => report::calendar(&mut out, &db, args, today)?,
        Commands::Meta(args) => report::meta(&mut out, &db, args, today)?,
        Commands::Timeline(args) => {
            report::timeline(&mut out, &db, args, &config.timeline_zone, today)?;
        }
        Commands::History(args) => {
            history::history(&mut out, &db, args, config.hide_blacklisted)?;
        }
        Commands::Known { json } => history::known(&mut out, &db, *json)?,
        Commands::Export(args) => {
            let exported_at = Local::now().fixed_offset();
            transfer::export(&mut out, &db, args, &util::system_timezone(), &exported_at)?;
        }
        Commands::Import(args) => transfer::import(&mut out, std::io::stdin().lock(), &mut db, args)?,
        Commands::Status { json } => ledger::status(&mut out, &db, &config.database_path, *json)?,
    }

    Ok(())
}
