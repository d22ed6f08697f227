//! The charge-accounting collaborator

use crate::Result;
use crate::record::UsageRecord;

/// Outcome of one synchronous charge or refund call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Succeeded,
    /// The charger ran but reported failure
    Failed { reason: String },
}

impl ChargeOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Forward and compensating operations against the accounting system.
///
/// Both calls block until the external operation finishes. An `Err` means
/// the charger could not be invoked at all and aborts the run; a reported
/// failure is an [`ChargeOutcome::Failed`] value.
pub trait Charger {
    /// Set up the environment subsequent calls run in (identity, paths).
    ///
    /// Called once per run, after the execution lock is held and before the
    /// first refund or charge.
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    fn charge(&mut self, record: &UsageRecord) -> Result<ChargeOutcome>;

    fn refund(&mut self, record_id: u64) -> Result<ChargeOutcome>;
}
