//! Environment for the accounting tool's programs

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{ChargerError, Result};

/// Variable naming the tool's installation root
pub const HOME_VAR: &str = "GOLD_HOME";

/// Variables passed to every charger process.
///
/// The current process environment is left untouched; children receive
/// `GOLD_HOME` and a `PATH` extended with the installation's `bin` and
/// `sbin` directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargerEnv {
    home: PathBuf,
    path: OsString,
}

impl ChargerEnv {
    /// Build the environment for an installation rooted at `home`.
    ///
    /// # Errors
    ///
    /// [`ChargerError::HomeMissing`] if `home` does not exist.
    pub fn new(home: impl Into<PathBuf>) -> Result<Self> {
        let home = home.into();
        if !home.exists() {
            return Err(ChargerError::HomeMissing { path: home });
        }
        let path = extended_path(std::env::var_os("PATH"), &home)?;
        Ok(Self { home, path })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Value of `PATH` for child processes
    pub fn path(&self) -> &OsString {
        &self.path
    }

    /// `(name, value)` pairs to set on a child process
    pub fn vars(&self) -> [(&str, &std::ffi::OsStr); 2] {
        [
            (HOME_VAR, self.home.as_os_str()),
            ("PATH", self.path.as_os_str()),
        ]
    }
}

fn extended_path(current: Option<OsString>, home: &Path) -> Result<OsString> {
    let mut dirs: Vec<PathBuf> = current
        .as_deref()
        .map(|value| std::env::split_paths(value).collect())
        .unwrap_or_default();
    for sub in ["bin", "sbin"] {
        let dir = home.join(sub);
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    Ok(std::env::join_paths(dirs)?)
}
