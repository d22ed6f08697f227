//! Error types for chargesync-ledger

use std::path::PathBuf;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Cannot open usage database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Record identifier {0} is negative")]
    NegativeIdentifier(i64),
}

impl From<LedgerError> for chargesync_core::Error {
    fn from(err: LedgerError) -> Self {
        chargesync_core::Error::collaborator("ledger", err.to_string())
    }
}
