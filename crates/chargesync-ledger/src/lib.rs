//! SQLite-backed usage ledger for chargesync
//!
//! Reads job usage from the accounting database (`JobUsageRecord` joined
//! with `JobUsageRecord_Meta` on `dbid`) and summarizes it per charging
//! dimension into [`UsageRecord`](chargesync_core::UsageRecord)s.

pub mod error;
mod query;
pub mod sqlite;

pub use error::{LedgerError, Result};
pub use sqlite::SqliteLedger;
