//! Durable record of how far synchronization has progressed

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Progress marker persisted between runs.
///
/// `last_successful_id` is the first record identifier the next window
/// starts from. It never moves backwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(default)]
    pub scope_name: String,
    #[serde(default)]
    pub last_successful_id: u64,
}

impl Cursor {
    pub fn new(scope_name: impl Into<String>, last_successful_id: u64) -> Self {
        Self {
            scope_name: scope_name.into(),
            last_successful_id,
        }
    }

    /// Move the cursor forward to `next`; returns whether it moved.
    pub fn advance(&mut self, next: u64) -> bool {
        if next > self.last_successful_id {
            self.last_successful_id = next;
            true
        } else {
            false
        }
    }
}

/// Loads and saves the [`Cursor`] file
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cursor, or a zero cursor if none was ever saved.
    pub fn load(&self) -> Result<Cursor> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No cursor yet; starting from zero");
                return Ok(Cursor::default());
            }
            Err(e) => return Err(Error::io(&self.path, e)),
        };

        toml::from_str(&content).map_err(|e| Error::CorruptState {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    /// Replace the cursor file atomically and flush it to disk.
    pub fn save(&self, cursor: &Cursor) -> Result<()> {
        let content = toml::to_string_pretty(cursor)?;
        chargesync_fs::write_atomic(&self.path, content.as_bytes())?;
        tracing::debug!(
            scope = %cursor.scope_name,
            last_successful_id = cursor.last_successful_id,
            "Cursor committed"
        );
        Ok(())
    }
}
