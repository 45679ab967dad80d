//! CLI subcommand implementations.

pub mod filter;
pub mod history;
pub mod ingest;
pub mod ledger;
pub mod markers;
pub mod report;
pub mod transfer;
pub mod util;
