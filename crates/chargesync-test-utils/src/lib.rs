//! Shared test utilities for the chargesync workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`ledger`]: [`MemoryLedger`], an in-memory ledger source
//! - [`charger`]: [`ScriptedCharger`], a charger that records every call
//! - [`state`]: [`TestState`], a temporary state directory with an engine builder

pub mod charger;
pub mod ledger;
pub mod state;

pub use charger::{Call, ScriptedCharger};
pub use ledger::{MemoryLedger, usage};
pub use state::TestState;
