//! chargesync CLI
//!
//! Charges usage records from the accounting database through the external
//! charge tool, surviving crashes without double charging.

mod cli;
mod commands;
mod error;
mod logging;

use clap::Parser;
use colored::Colorize;

use chargesync_core::Config;
use cli::{Cli, Commands};
use error::Result;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "Run aborted");
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    logging::init(cli.verbose, &config.logging)?;
    tracing::debug!(config = %cli.config.display(), "Configuration loaded");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run_sync(&config).map(|_| ()),
        Commands::Status => commands::status(&config),
    }
}
