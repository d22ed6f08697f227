//! The resumable window loop
//!
//! A run takes the execution lock, compensates whatever a previous run left
//! in the journal, then drains the ledger one identifier window at a time:
//! journal, charge, confirm, then commit the cursor.

mod engine;

pub use engine::SyncEngine;

use std::path::PathBuf;

use crate::config::DEFAULT_WINDOW;

/// What to fetch and how much at a time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Scope filter handed to the ledger
    pub scope: String,
    /// Width of the identifier range fetched per window; never zero
    pub window: u64,
}

impl SyncOptions {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            window: DEFAULT_WINDOW,
        }
    }

    pub fn with_window(mut self, window: u64) -> Self {
        self.window = window.max(1);
        self
    }
}

/// Files persisted between runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub cursor: PathBuf,
    pub journal: PathBuf,
    pub lock: PathBuf,
}

impl StatePaths {
    /// Conventional file names inside one state directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            cursor: dir.join("cursor.toml"),
            journal: dir.join("intent.journal"),
            lock: dir.join("chargesync.lock"),
        }
    }
}

/// Outcome of one completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Compensating refunds issued during reconciliation
    pub refunds_issued: usize,
    /// Of those, refunds the charger reported as failed
    pub refund_failures: usize,
    /// Windows fetched from the ledger
    pub windows: usize,
    pub records_charged: usize,
    pub charge_failures: usize,
    /// Longest run of consecutive charge failures
    pub longest_failure_streak: usize,
    /// Cursor position committed last
    pub final_cursor: u64,
}
