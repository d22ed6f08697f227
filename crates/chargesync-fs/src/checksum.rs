//! SHA-256 checksum utilities
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) and the
//! `<checksum>:<payload>` line framing used by the intent journal.

use sha2::{Digest, Sha256};

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of string content.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_content_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Check that `expected` is the canonical checksum of `content`.
pub fn verify_content_checksum(content: &str, expected: &str) -> bool {
    compute_content_checksum(content) == expected
}

/// Frame a payload as a single `<checksum>:<payload>` line (no newline).
pub fn frame_line(payload: &str) -> String {
    format!("{}:{}", compute_content_checksum(payload), payload)
}

/// Split a framed line into its checksum and payload.
///
/// The payload may itself contain `:`; only the separator directly after the
/// hex digest is significant. Returns `None` when the line carries no
/// recognizable checksum prefix.
pub fn split_line(line: &str) -> Option<(&str, &str)> {
    let digest_and_payload = line.strip_prefix(PREFIX)?;
    let (digest, _) = digest_and_payload.split_once(':')?;
    let checksum_len = PREFIX.len() + digest.len();
    Some((&line[..checksum_len], &line[checksum_len + 1..]))
}
