//! Error types for chargesync-core

use std::path::PathBuf;

/// Result type for chargesync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a synchronization run
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The execution lock could not be taken or released
    #[error(transparent)]
    Lock(#[from] chargesync_lock::LockError),

    /// A journal line failed verification; never repaired automatically
    #[error("Journal {path} failed its integrity check at line {line}: {reason}")]
    Integrity {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A record cannot be written to the journal
    #[error("Record {record_id} cannot be journaled: {reason}")]
    InvalidRecord { record_id: u64, reason: String },

    /// The charger rejected a record; contained by the sync loop
    #[error("Charging record {record_id} failed: {reason}")]
    ChargeFailure { record_id: u64, reason: String },

    /// The ledger or charger could not be reached at all
    #[error("{collaborator} unavailable: {message}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        message: String,
    },

    /// Configuration file missing, unparseable or inconsistent
    #[error("Invalid configuration {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// A state file exists but cannot be parsed
    #[error("State file {path} is unreadable: {message}")]
    CorruptState { path: PathBuf, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem error from chargesync-fs
    #[error(transparent)]
    Fs(#[from] chargesync_fs::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn collaborator(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::CollaboratorUnavailable {
            collaborator,
            message: message.into(),
        }
    }
}
