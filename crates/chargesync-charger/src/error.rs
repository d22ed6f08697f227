//! Error types for chargesync-charger

use std::path::PathBuf;

/// Result type for charger operations
pub type Result<T> = std::result::Result<T, ChargerError>;

#[derive(Debug, thiserror::Error)]
pub enum ChargerError {
    #[error("Charger home {path} does not exist")]
    HomeMissing { path: PathBuf },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open charger log {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Cannot switch to user {user}: {source}")]
    Privileges {
        user: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid PATH entry: {0}")]
    InvalidPath(#[from] std::env::JoinPathsError),
}

impl From<ChargerError> for chargesync_core::Error {
    fn from(err: ChargerError) -> Self {
        chargesync_core::Error::collaborator("charger", err.to_string())
    }
}
