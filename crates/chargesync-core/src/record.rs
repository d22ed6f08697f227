//! Usage records as they flow from the ledger to the charger

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Leading run of digits, ignoring surrounding whitespace
static LEADING_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d+)").unwrap());

/// Normalize a count-like ledger value to a positive, digit-only string.
///
/// Trailing garbage is dropped (`"4L"` becomes `"4"`). Absent, empty,
/// non-numeric and zero values all become `"1"`.
pub fn normalize_count(raw: Option<&str>) -> String {
    raw.and_then(|value| LEADING_DIGITS.captures(value))
        .and_then(|caps| caps.get(1))
        .map(|digits| digits.as_str().trim_start_matches('0'))
        .filter(|digits| !digits.is_empty())
        .map_or_else(|| "1".to_string(), str::to_string)
}

/// A usage summary exactly as read from the ledger, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawUsageRecord {
    pub record_id: u64,
    pub resource_type: Option<String>,
    pub scope_name: Option<String>,
    pub local_user: Option<String>,
    pub charge_amount: Option<String>,
    pub wall_duration: Option<String>,
    pub cpu_time: Option<String>,
    pub node_count: Option<String>,
    pub job_count: Option<String>,
    pub processors: Option<String>,
    pub end_time: Option<String>,
    pub machine_name: Option<String>,
    pub project_name: Option<String>,
}

/// One summarized unit of chargeable work.
///
/// Count fields hold canonical digit strings produced by [`normalize_count`].
/// The serialized JSON form is the journal payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub record_id: u64,
    pub resource_type: String,
    pub scope_name: String,
    pub local_user: String,
    /// Seconds to charge
    pub charge_amount: String,
    pub wall_duration: String,
    pub cpu_time: String,
    pub node_count: String,
    pub job_count: String,
    pub processors: String,
    pub end_time: String,
    pub machine_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

impl From<RawUsageRecord> for UsageRecord {
    fn from(raw: RawUsageRecord) -> Self {
        let count = |value: &Option<String>| normalize_count(value.as_deref());
        let text = |value: Option<String>| value.map(|v| v.trim().to_string()).unwrap_or_default();

        // Charge defaults to the wall duration when the ledger has none
        let charge_amount = match raw.charge_amount.as_deref() {
            Some(charge) if !charge.trim().is_empty() => normalize_count(Some(charge)),
            _ => count(&raw.wall_duration),
        };

        Self {
            record_id: raw.record_id,
            charge_amount,
            wall_duration: count(&raw.wall_duration),
            cpu_time: count(&raw.cpu_time),
            node_count: count(&raw.node_count),
            job_count: count(&raw.job_count),
            processors: count(&raw.processors),
            resource_type: text(raw.resource_type),
            scope_name: text(raw.scope_name),
            local_user: text(raw.local_user),
            end_time: text(raw.end_time),
            machine_name: text(raw.machine_name),
            project_name: raw
                .project_name
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        }
    }
}

impl UsageRecord {
    /// Canonical single-line serialization used as the journal payload.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_payload(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}
