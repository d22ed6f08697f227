//! Configuration file loading
//!
//! Configuration is a TOML file (default: `/etc/chargesync/chargesync.toml`):
//!
//! ```toml
//! [ledger]
//! database = "/var/lib/chargesync/usage.db"
//! scope = "^osg-.*"
//!
//! [charger]
//! home = "/opt/gold"
//! username = "gold"
//!
//! [state]
//! cursor = "/var/lib/chargesync/cursor.toml"
//! journal = "/var/lib/chargesync/intent.journal"
//! lock = "/var/lock/chargesync.lock"
//!
//! [lock]
//! stale_timeout_secs = 3600
//! ```

use std::path::{Path, PathBuf};

use chargesync_lock::{LockOptions, StalePolicy};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::sync::{StatePaths, SyncOptions};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/chargesync/chargesync.toml";

/// Identifier range fetched per window unless configured otherwise
pub const DEFAULT_WINDOW: u64 = 100_000;

/// Root configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub charger: ChargerConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where usage records are read from
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Path to the usage database
    pub database: PathBuf,
    /// Regular expression selecting the scopes (probes) this instance charges
    pub scope: String,
}

/// How the charge-accounting tool is invoked
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChargerConfig {
    /// Installation root of the accounting tool
    pub home: PathBuf,
    /// Unprivileged identity charges run as; `None` keeps the current one
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_charge_command")]
    pub charge_command: String,
    #[serde(default = "default_refund_command")]
    pub refund_command: String,
    /// File receiving the output of every charger invocation
    #[serde(default = "default_charger_log")]
    pub log_file: PathBuf,
}

/// Locations of the files persisted between runs
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    #[serde(default = "default_cursor_path")]
    pub cursor: PathBuf,
    #[serde(default = "default_journal_path")]
    pub journal: PathBuf,
    #[serde(default = "default_lock_path")]
    pub lock: PathBuf,
}

/// Execution lock behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    /// Holders older than this many seconds are killed; negative never kills
    #[serde(default = "default_stale_timeout")]
    pub stale_timeout_secs: i64,
}

/// Sync loop tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default = "default_window")]
    pub window: u64,
}

/// Log output
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log file; standard error when absent
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Filter directive such as `info` or `chargesync_core=debug`
    #[serde(default)]
    pub level: Option<String>,
}

fn default_charge_command() -> String {
    "gcharge".to_string()
}

fn default_refund_command() -> String {
    "grefund".to_string()
}

fn default_charger_log() -> PathBuf {
    PathBuf::from("/var/log/chargesync/charger.log")
}

fn default_cursor_path() -> PathBuf {
    PathBuf::from("/var/lib/chargesync/cursor.toml")
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("/var/lib/chargesync/intent.journal")
}

fn default_lock_path() -> PathBuf {
    PathBuf::from("/var/lock/chargesync.lock")
}

fn default_stale_timeout() -> i64 {
    3600
}

fn default_window() -> u64 {
    DEFAULT_WINDOW
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            cursor: default_cursor_path(),
            journal: default_journal_path(),
            lock: default_lock_path(),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_timeout_secs: default_stale_timeout(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: format!("cannot read configuration: {e}"),
        })?;
        Self::parse(path, &content)
    }

    /// Parse configuration text; `path` is used for error messages only.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |message: &str| {
            Err(Error::Config {
                path: path.to_path_buf(),
                message: message.to_string(),
            })
        };

        if self.sync.window == 0 {
            return invalid("sync.window must be greater than zero");
        }
        if self.ledger.scope.trim().is_empty() {
            return invalid("ledger.scope must not be empty");
        }
        if let Err(e) = regex::Regex::new(&self.ledger.scope) {
            return invalid(&format!("ledger.scope is not a valid regular expression: {e}"));
        }
        if self.charger.charge_command.trim().is_empty()
            || self.charger.refund_command.trim().is_empty()
        {
            return invalid("charger commands must not be empty");
        }
        Ok(())
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            stale: StalePolicy::from_secs(self.lock.stale_timeout_secs),
            ..LockOptions::default()
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            scope: self.ledger.scope.clone(),
            window: self.sync.window,
        }
    }

    pub fn state_paths(&self) -> StatePaths {
        StatePaths {
            cursor: self.state.cursor.clone(),
            journal: self.state.journal.clone(),
            lock: self.state.lock.clone(),
        }
    }
}
