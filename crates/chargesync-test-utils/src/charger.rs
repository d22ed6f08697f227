//! [`ScriptedCharger`]: a [`Charger`] whose answers are set up by the test.

use std::collections::HashSet;
use std::path::PathBuf;

use chargesync_core::{ChargeOutcome, Charger, Error, Result, UsageRecord};

/// One call made against the charger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Charge(u64),
    Refund(u64),
}

/// Charger that succeeds unless told otherwise and remembers every call.
///
/// # Example
///
/// ```rust
/// use chargesync_test_utils::{Call, ScriptedCharger, usage};
/// use chargesync_core::Charger;
///
/// let mut charger = ScriptedCharger::new().failing_charges(&[2]);
/// assert!(charger.charge(&usage(1)).unwrap().is_success());
/// assert!(!charger.charge(&usage(2)).unwrap().is_success());
/// assert_eq!(charger.calls(), &[Call::Charge(1), Call::Charge(2)]);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedCharger {
    calls: Vec<Call>,
    failing_charges: HashSet<u64>,
    failing_refunds: HashSet<u64>,
    failing_once: HashSet<u64>,
    unavailable_after: Option<usize>,
    journal: Option<PathBuf>,
    unjournaled: Vec<u64>,
    prepared: bool,
}

impl ScriptedCharger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a failed charge for these record identifiers.
    pub fn failing_charges(mut self, ids: &[u64]) -> Self {
        self.failing_charges.extend(ids);
        self
    }

    /// Fail only the first charge attempt for these record identifiers.
    pub fn failing_once(mut self, ids: &[u64]) -> Self {
        self.failing_once.extend(ids);
        self
    }

    /// Report a failed refund for these record identifiers.
    pub fn failing_refunds(mut self, ids: &[u64]) -> Self {
        self.failing_refunds.extend(ids);
        self
    }

    /// Become unreachable after `charges` successful charge calls, the way a
    /// run dies midway through a window.
    pub fn unavailable_after(mut self, charges: usize) -> Self {
        self.unavailable_after = Some(charges);
        self
    }

    /// On every charge, check that the journal at `path` already holds the
    /// record; violations are collected in [`unjournaled`](Self::unjournaled).
    pub fn watching_journal(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal = Some(path.into());
        self
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn charged(&self) -> Vec<u64> {
        self.ids(|call| match call {
            Call::Charge(id) => Some(id),
            Call::Refund(_) => None,
        })
    }

    pub fn refunded(&self) -> Vec<u64> {
        self.ids(|call| match call {
            Call::Refund(id) => Some(id),
            Call::Charge(_) => None,
        })
    }

    /// Records charged while absent from the watched journal
    pub fn unjournaled(&self) -> &[u64] {
        &self.unjournaled
    }

    pub fn was_prepared(&self) -> bool {
        self.prepared
    }

    /// Forget recorded calls; failure scripts stay in place.
    pub fn reset_calls(&mut self) {
        self.calls.clear();
    }

    /// Make the charger reachable again and stop failing charges.
    pub fn recover(&mut self) {
        self.unavailable_after = None;
        self.failing_charges.clear();
    }

    fn ids(&self, select: impl Fn(Call) -> Option<u64>) -> Vec<u64> {
        self.calls.iter().copied().filter_map(select).collect()
    }

    fn journal_holds(&self, record_id: u64) -> bool {
        let Some(path) = &self.journal else {
            return true;
        };
        let needle = format!("\"record_id\":{record_id},");
        std::fs::read_to_string(path)
            .map(|content| content.lines().any(|line| line.contains(&needle)))
            .unwrap_or(false)
    }
}

impl Charger for ScriptedCharger {
    fn prepare(&mut self) -> Result<()> {
        self.prepared = true;
        Ok(())
    }

    fn charge(&mut self, record: &UsageRecord) -> Result<ChargeOutcome> {
        if let Some(limit) = self.unavailable_after {
            let charged = self
                .calls
                .iter()
                .filter(|c| matches!(c, Call::Charge(_)))
                .count();
            if charged >= limit {
                return Err(Error::collaborator("charger", "scripted outage"));
            }
        }

        if !self.journal_holds(record.record_id) {
            self.unjournaled.push(record.record_id);
        }
        self.calls.push(Call::Charge(record.record_id));

        if self.failing_once.remove(&record.record_id)
            || self.failing_charges.contains(&record.record_id)
        {
            Ok(ChargeOutcome::failed("scripted charge failure"))
        } else {
            Ok(ChargeOutcome::Succeeded)
        }
    }

    fn refund(&mut self, record_id: u64) -> Result<ChargeOutcome> {
        self.calls.push(Call::Refund(record_id));
        if self.failing_refunds.contains(&record_id) {
            Ok(ChargeOutcome::failed("scripted refund failure"))
        } else {
            Ok(ChargeOutcome::Succeeded)
        }
    }
}
