//! The usage-record source collaborator

use crate::Result;
use crate::record::UsageRecord;

/// Read-only view of the usage ledger.
///
/// Implementations return summaries aggregated by charging dimensions
/// (resource type, scope, user, node count, processors, day, machine and
/// project), each identified by a monotonic record identifier.
pub trait LedgerSource {
    /// Lowest record identifier currently in the ledger, `None` when empty.
    fn min_id(&self) -> Result<Option<u64>>;

    /// Highest record identifier currently in the ledger, `None` when empty.
    fn max_id(&self) -> Result<Option<u64>>;

    /// Summaries with identifiers in `[from_id, from_id + window_size)` whose
    /// scope matches `scope`, ascending by identifier.
    fn fetch_window(&self, scope: &str, from_id: u64, window_size: u64)
    -> Result<Vec<UsageRecord>>;
}
