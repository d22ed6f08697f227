//! Synchronous program invocation with output sent to a log file

use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use crate::error::{ChargerError, Result};

/// Run `program` with `args`, appending its stdout and stderr to `log_file`.
///
/// Blocks until the program exits and returns its status. The log file is
/// created if needed.
///
/// # Errors
///
/// [`ChargerError::LogFile`] if the log cannot be opened,
/// [`ChargerError::Spawn`] if the program cannot be started.
pub fn run_logged<'a, I>(program: &str, args: &[String], env: I, log_file: &Path) -> Result<ExitStatus>
where
    I: IntoIterator<Item = (&'a str, &'a OsStr)>,
{
    let log_err = |source| ChargerError::LogFile {
        path: log_file.to_path_buf(),
        source,
    };
    let stdout = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(log_err)?;
    let stderr = stdout.try_clone().map_err(log_err)?;

    tracing::debug!(program, ?args, "Running charger command");
    let status = Command::new(program)
        .args(args)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .status()
        .map_err(|source| ChargerError::Spawn {
            program: program.to_string(),
            source,
        })?;

    tracing::debug!(program, code = ?status.code(), "Charger command finished");
    Ok(status)
}
