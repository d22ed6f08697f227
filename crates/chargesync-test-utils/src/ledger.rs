//! In-memory [`LedgerSource`] for sync loop tests.

use std::cell::RefCell;

use chargesync_core::{LedgerSource, RawUsageRecord, Result, UsageRecord};

/// A validated record with the given identifier, charged to `alice` on `atlas`.
pub fn usage(record_id: u64) -> UsageRecord {
    UsageRecord::from(RawUsageRecord {
        record_id,
        resource_type: Some("Batch".into()),
        scope_name: Some("atlas".into()),
        local_user: Some("alice".into()),
        wall_duration: Some("3600".into()),
        node_count: Some("1".into()),
        processors: Some("8".into()),
        end_time: Some("2026-01-02 03:04:05".into()),
        machine_name: Some("cluster-a".into()),
        project_name: Some("physics".into()),
        ..Default::default()
    })
}

/// Ledger backed by a vector of records.
///
/// `fetch_window` matches scope names exactly and records every request so
/// tests can assert on the windows the loop asked for.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: Vec<UsageRecord>,
    requests: RefCell<Vec<(u64, u64)>>,
}

impl MemoryLedger {
    pub fn new(records: Vec<UsageRecord>) -> Self {
        Self {
            records,
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Ledger holding [`usage`] records for every identifier in `ids`.
    pub fn with_ids(ids: &[u64]) -> Self {
        Self::new(ids.iter().copied().map(usage).collect())
    }

    pub fn push(&mut self, record: UsageRecord) {
        self.records.push(record);
    }

    /// `(from_id, window_size)` of every fetch so far
    pub fn requests(&self) -> Vec<(u64, u64)> {
        self.requests.borrow().clone()
    }
}

impl LedgerSource for MemoryLedger {
    fn min_id(&self) -> Result<Option<u64>> {
        Ok(self.records.iter().map(|r| r.record_id).min())
    }

    fn max_id(&self) -> Result<Option<u64>> {
        Ok(self.records.iter().map(|r| r.record_id).max())
    }

    fn fetch_window(&self, scope: &str, from_id: u64, window_size: u64) -> Result<Vec<UsageRecord>> {
        self.requests.borrow_mut().push((from_id, window_size));
        let end = from_id.saturating_add(window_size);

        let mut records: Vec<UsageRecord> = self
            .records
            .iter()
            .filter(|r| r.scope_name == scope && (from_id..end).contains(&r.record_id))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.record_id);
        Ok(records)
    }
}
