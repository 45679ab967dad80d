//! Playtime CLI library.
//!
//! This crate provides the `pt` command-line interface over the activity ledger.

mod cli;
pub mod commands;
mod config;
pub mod recorder;

pub use cli::{Cli, Commands};
pub use config::Config;
