//! Error types for chargesync-lock

use std::path::PathBuf;

/// Result type for lock operations
pub type Result<T> = std::result::Result<T, LockError>;

/// Errors that can occur while acquiring or releasing the execution lock
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The directory meant to contain the lock file is missing
    #[error("Lock is to be created in directory {path}, which does not exist")]
    DirectoryMissing { path: PathBuf },

    /// Every attempt found the lock held by another process
    #[error("Unable to acquire lock {path} after {attempts} attempts{}", holder_suffix(.holder))]
    Unavailable {
        path: PathBuf,
        attempts: u32,
        /// Last holder PID observed, if the platform could report one
        holder: Option<u32>,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LockError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn holder_suffix(holder: &Option<u32>) -> String {
    match holder {
        Some(pid) => format!(" (held by process {pid})"),
        None => String::new(),
    }
}
