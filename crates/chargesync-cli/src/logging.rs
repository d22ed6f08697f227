//! Tracing subscriber setup

use std::fs::OpenOptions;
use std::sync::Mutex;

use chargesync_core::config::LoggingConfig;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::{CliError, Result};

/// Filter directive in effect: `--verbose` wins, then `RUST_LOG`, then the
/// configured level, then `info`.
fn filter(verbose: bool, config: &LoggingConfig) -> Result<EnvFilter> {
    if verbose {
        return Ok(EnvFilter::new("debug"));
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = config.level.as_deref().unwrap_or("info");
    EnvFilter::try_new(level).map_err(|e| CliError::Logging(format!("invalid level {level:?}: {e}")))
}

/// Install the global subscriber, writing to the configured log file or
/// standard error.
pub fn init(verbose: bool, config: &LoggingConfig) -> Result<()> {
    let filter_layer = filter(verbose, config)?;

    let installed = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| CliError::Logging(format!("{}: {e}", path.display())))?;
            let fmt_layer = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt_layer)
                .try_init()
        }
        None => {
            let fmt_layer = fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt_layer)
                .try_init()
        }
    };
    installed.map_err(|e| CliError::Logging(e.to_string()))?;

    tracing::debug!("Logging initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_forces_debug() {
        let filter = filter(true, &LoggingConfig::default()).unwrap();
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn bad_configured_level_is_rejected() {
        // SAFETY: no other test in this binary reads RUST_LOG concurrently
        unsafe { std::env::remove_var("RUST_LOG") };
        let config = LoggingConfig {
            file: None,
            level: Some("chargesync=loud".into()),
        };
        assert!(filter(false, &config).is_err());
    }
}
