//! Crash-safe charge synchronization engine
//!
//! Drives usage records from a [`LedgerSource`] into a [`Charger`] so that
//! each record is charged at most once without being reversed, even across
//! crashes and kills:
//!
//! - every charge is preceded by a durable intent in the [`IntentJournal`]
//! - the next run refunds intents that were never settled
//! - progress is committed through the [`CursorStore`] one window at a time
//!
//! The [`SyncEngine`] ties these together under the execution lock.

pub mod charger;
pub mod config;
pub mod cursor;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod record;
pub mod sync;

pub use charger::{ChargeOutcome, Charger};
pub use config::Config;
pub use cursor::{Cursor, CursorStore};
pub use error::{Error, Result};
pub use journal::{IntentId, IntentJournal, JournalWriter, ReconcileReport};
pub use ledger::LedgerSource;
pub use record::{RawUsageRecord, UsageRecord, normalize_count};
pub use sync::{RunSummary, StatePaths, SyncEngine, SyncOptions};
