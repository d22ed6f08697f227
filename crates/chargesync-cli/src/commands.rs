//! Subcommand implementations

use chargesync_charger::GoldCharger;
use chargesync_core::{Config, CursorStore, IntentJournal, RunSummary, SyncEngine};
use chargesync_ledger::SqliteLedger;
use chargesync_lock::PosixLockPlatform;
use colored::Colorize;

use crate::error::Result;

/// Reconcile, then drain the ledger into the charger.
pub fn run_sync(config: &Config) -> Result<RunSummary> {
    let ledger = SqliteLedger::open(&config.ledger.database)?;
    let mut charger = GoldCharger::from_config(&config.charger)?;
    let engine = SyncEngine::new(
        PosixLockPlatform,
        config.lock_options(),
        config.state_paths(),
        config.sync_options(),
    );

    let summary = engine.run(&ledger, &mut charger)?;

    println!(
        "{} {} charged, {} failed, {} refunded; cursor at {}",
        "done".green().bold(),
        summary.records_charged,
        summary.charge_failures,
        summary.refunds_issued,
        summary.final_cursor
    );
    if summary.charge_failures > 0 {
        println!(
            "{} failed charges are refunded at the start of the next run",
            "note:".yellow().bold()
        );
    }
    Ok(summary)
}

/// Print the committed cursor and the journal backlog.
pub fn status(config: &Config) -> Result<()> {
    let paths = config.state_paths();
    let cursor = CursorStore::new(&paths.cursor).load()?;
    let pending = IntentJournal::new(&paths.journal).pending_count()?;

    let scope = if cursor.scope_name.is_empty() {
        "(none)".dimmed().to_string()
    } else {
        cursor.scope_name.clone()
    };
    println!("{:<10} {}", "scope".bold(), scope);
    println!("{:<10} {}", "cursor".bold(), cursor.last_successful_id);
    if pending == 0 {
        println!("{:<10} {}", "journal".bold(), "settled".green());
    } else {
        println!(
            "{:<10} {}",
            "journal".bold(),
            format!("{pending} pending").yellow()
        );
    }
    Ok(())
}
