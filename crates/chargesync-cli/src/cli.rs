//! CLI argument parsing using clap derive

use std::path::PathBuf;

use chargesync_core::config::DEFAULT_CONFIG_PATH;
use clap::{Parser, Subcommand};

/// chargesync - charge usage records to the accounting system exactly once
#[derive(Parser, Debug)]
#[command(name = "chargesync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, env = "CHARGESYNC_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Reconcile leftover intents, then charge every new usage record
    Run,

    /// Show the committed cursor and unsettled journal entries
    ///
    /// Reads the state files without taking the execution lock.
    Status,
}
