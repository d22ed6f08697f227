//! [`TestState`]: a throwaway state directory for sync runs.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chargesync_core::{Cursor, CursorStore, StatePaths, SyncOptions};
use chargesync_lock::{LockOptions, StalePolicy};
use tempfile::TempDir;

/// Temporary directory holding the cursor, journal and lock files.
pub struct TestState {
    temp_dir: TempDir,
    paths: StatePaths,
}

impl Default for TestState {
    fn default() -> Self {
        Self::new()
    }
}

impl TestState {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let paths = StatePaths::in_dir(temp_dir.path());
        Self { temp_dir, paths }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn paths(&self) -> &StatePaths {
        &self.paths
    }

    /// Lock options that never sleep
    pub fn fast_lock_options() -> LockOptions {
        LockOptions {
            stale: StalePolicy::Never,
            max_attempts: 1,
            backoff_unit: Duration::ZERO,
            reclaim_delay: Duration::ZERO,
        }
    }

    /// Engine over this state directory using the real POSIX lock.
    #[cfg(unix)]
    pub fn engine(
        &self,
        options: SyncOptions,
    ) -> chargesync_core::SyncEngine<chargesync_lock::PosixLockPlatform> {
        chargesync_core::SyncEngine::new(
            chargesync_lock::PosixLockPlatform,
            Self::fast_lock_options(),
            self.paths.clone(),
            options,
        )
    }

    pub fn cursor(&self) -> Cursor {
        CursorStore::new(&self.paths.cursor).load().unwrap()
    }

    pub fn set_cursor(&self, cursor: &Cursor) {
        CursorStore::new(&self.paths.cursor).save(cursor).unwrap();
    }

    /// Lines currently in the journal; empty when there is none.
    pub fn journal_lines(&self) -> Vec<String> {
        read_lines(&self.paths.journal)
    }

    pub fn confirmation_path(&self) -> std::path::PathBuf {
        let mut path = self.paths.journal.clone().into_os_string();
        path.push(".refund");
        path.into()
    }

    pub fn confirmation_lines(&self) -> Vec<String> {
        read_lines(&self.confirmation_path())
    }

    pub fn write_journal(&self, lines: &[String]) {
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(&self.paths.journal, content).unwrap();
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|content| content.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
