//! Error types for chargesync-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Exit status when the execution lock could not be taken
pub const EXIT_LOCKED: i32 = 2;
/// Exit status when the journal failed verification
pub const EXIT_INTEGRITY: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] chargesync_core::Error),

    #[error(transparent)]
    Ledger(#[from] chargesync_ledger::LedgerError),

    #[error("Cannot set up logging: {0}")]
    Logging(String),
}

impl CliError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Core(chargesync_core::Error::Lock(_)) => EXIT_LOCKED,
            Self::Core(chargesync_core::Error::Integrity { .. }) => EXIT_INTEGRITY,
            _ => 1,
        }
    }
}
