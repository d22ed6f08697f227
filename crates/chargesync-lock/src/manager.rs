//! Lock acquisition with bounded retries and stale holder reclamation

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LockError, Result};
use crate::platform::LockPlatform;

/// When a contending holder may be forcibly reclaimed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalePolicy {
    /// Never signal the holder
    Never,
    /// Signal holders that have been running longer than this
    After(Duration),
}

impl StalePolicy {
    /// Build a policy from a signed timeout in seconds; negative never steals.
    pub fn from_secs(secs: i64) -> Self {
        match u64::try_from(secs) {
            Ok(secs) => Self::After(Duration::from_secs(secs)),
            Err(_) => Self::Never,
        }
    }
}

impl Default for StalePolicy {
    fn default() -> Self {
        Self::After(Duration::from_secs(3600))
    }
}

/// Tuning for [`LockManager::acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub stale: StalePolicy,
    /// Number of lock attempts before giving up
    pub max_attempts: u32,
    /// Sleep after attempt `n` is `n * backoff_unit`
    pub backoff_unit: Duration,
    /// Pause between signaling a stale holder and retrying
    pub reclaim_delay: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            stale: StalePolicy::default(),
            max_attempts: 5,
            backoff_unit: Duration::from_secs(1),
            reclaim_delay: Duration::from_millis(200),
        }
    }
}

/// Acquires the system-wide execution lock
#[derive(Debug)]
pub struct LockManager<P> {
    platform: P,
    options: LockOptions,
}

impl<P: LockPlatform> LockManager<P> {
    pub fn new(platform: P, options: LockOptions) -> Self {
        Self { platform, options }
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    /// Take the exclusive lock at `path` without blocking on it.
    ///
    /// On contention the holder is inspected and, if the stale policy
    /// allows, killed and the lock retried immediately. Otherwise the
    /// attempt is retried with linear backoff until `max_attempts` is used up.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Unavailable`] once every attempt failed, and
    /// [`LockError::DirectoryMissing`] if the lock directory does not exist.
    pub fn acquire(&self, path: &Path) -> Result<LockGuard> {
        let path = std::path::absolute(path).map_err(|e| LockError::io(path, e))?;
        if let Some(dir) = path.parent()
            && !dir.is_dir()
        {
            return Err(LockError::DirectoryMissing {
                path: dir.to_path_buf(),
            });
        }

        tracing::debug!(path = %path.display(), "Trying to acquire lock");

        let mut last_holder = None;
        let max_attempts = self.options.max_attempts;

        for attempt in 1..=max_attempts {
            let file = match self.lock_current(&path)? {
                Attempt::Locked(file) => return LockGuard::claim(file, path),
                Attempt::Busy(file) => file,
            };

            let (reclaimable, holder) = self.check_holder(&file, &path, attempt)?;
            last_holder = holder.or(last_holder);
            drop(file);

            if reclaimable {
                // Give the killed holder a moment to exit
                std::thread::sleep(self.options.reclaim_delay);
                if let Attempt::Locked(file) = self.lock_current(&path)? {
                    return LockGuard::claim(file, path);
                }
            }

            let sleep = self.options.backoff_unit * attempt;
            let remaining = max_attempts - attempt;
            if attempt == 1 {
                tracing::debug!(
                    attempt,
                    remaining,
                    sleep_secs = sleep.as_secs_f64(),
                    "Lock is busy; will retry"
                );
            } else {
                tracing::warn!(
                    "Unable to acquire lock, try {}; will sleep for {:.1} seconds and try {} more times",
                    attempt,
                    sleep.as_secs_f64(),
                    remaining
                );
            }
            std::thread::sleep(sleep);
        }

        Err(LockError::Unavailable {
            path,
            attempts: max_attempts,
            holder: last_holder,
        })
    }

    /// Open the file at `path` and try to lock it.
    ///
    /// A releasing holder unlinks the file before closing it, so a lock may
    /// land on an inode that is no longer reachable at `path`. Such a lock
    /// excludes nobody; the file is reopened until the locked inode is the
    /// one at `path` or the lock is busy.
    fn lock_current(&self, path: &Path) -> Result<Attempt> {
        let mut reopens = 0;
        loop {
            let file = open_lock_file(path)?;
            if !self.lock(&file, path)? {
                return Ok(Attempt::Busy(file));
            }
            if is_current(&file, path)? {
                return Ok(Attempt::Locked(file));
            }

            reopens += 1;
            tracing::debug!(path = %path.display(), reopens, "Lock file replaced while locking; reopening");
            if reopens >= MAX_REOPENS {
                // Let the caller inspect whoever holds the current file
                return Ok(Attempt::Busy(open_lock_file(path)?));
            }
        }
    }

    fn lock(&self, file: &File, path: &Path) -> Result<bool> {
        self.platform
            .try_lock(file)
            .map_err(|e| LockError::io(path, e))
    }

    /// Inspect the process holding the lock and kill it if it is stale.
    ///
    /// Returns whether an immediate retry is worthwhile, plus the holder PID.
    fn check_holder(&self, file: &File, path: &Path, attempt: u32) -> Result<(bool, Option<u32>)> {
        let pid = match self.platform.query_holder_pid(file) {
            Ok(Some(pid)) => pid,
            // Released between our attempt and the query
            Ok(None) => return Ok((true, None)),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Unable to determine which process holds the lock"
                );
                return Ok((false, None));
            }
        };

        if pid == std::process::id() {
            return Ok((true, Some(pid)));
        }

        let timeout = match self.options.stale {
            StalePolicy::Never => {
                tracing::warn!(pid, "Another process, {}, holds the lock file", pid);
                return Ok((false, Some(pid)));
            }
            StalePolicy::After(timeout) => timeout,
        };

        let age = match self.platform.holder_age(pid) {
            Ok(age) => age,
            Err(e) if e.kind() == ErrorKind::Unsupported => {
                tracing::warn!(
                    pid,
                    "Another process, {} (age unknown), holds the lock file; stale holders are not reclaimed on this platform",
                    pid
                );
                return Ok((false, Some(pid)));
            }
            Err(e) => {
                tracing::warn!(pid, "Another process, {}, holds the lock file", pid);
                tracing::error!(
                    pid,
                    error = %e,
                    "Unable to get the other process's age; will not time it out"
                );
                return Ok((false, Some(pid)));
            }
        };

        if attempt == 1 {
            tracing::debug!(pid, age_secs = age.as_secs(), "Lock held by another process");
        } else {
            tracing::warn!(
                pid,
                age_secs = age.as_secs(),
                "Another process, {} (age {} seconds), holds the lock file",
                pid,
                age.as_secs()
            );
        }

        if age <= timeout {
            return Ok((false, Some(pid)));
        }

        tracing::warn!(pid, age_secs = age.as_secs(), "Killing old process with lock file: {}", pid);
        self.platform
            .terminate(pid)
            .map_err(|e| LockError::io(path, e))?;
        Ok((true, Some(pid)))
    }
}

/// Times one attempt may find the lock file swapped underneath it
const MAX_REOPENS: u32 = 8;

/// Outcome of a single lock attempt
enum Attempt {
    Locked(File),
    /// Held elsewhere; the file is kept open to ask who holds it
    Busy(File),
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| LockError::io(path, e))
}

/// Whether `file` is still the file linked at `path`.
#[cfg(unix)]
fn is_current(file: &File, path: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata().map_err(|e| LockError::io(path, e))?;
    match fs::metadata(path) {
        Ok(linked) => Ok(held.dev() == linked.dev() && held.ino() == linked.ino()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(LockError::io(path, e)),
    }
}

#[cfg(not(unix))]
fn is_current(_file: &File, _path: &Path) -> Result<bool> {
    Ok(true)
}

/// Ownership of the execution lock.
///
/// The lock file is truncated and closed when the guard is released or
/// dropped. It is unlinked only by the process that acquired it.
#[derive(Debug)]
pub struct LockGuard {
    file: Option<File>,
    path: PathBuf,
    owner_pid: u32,
}

impl LockGuard {
    fn claim(mut file: File, path: PathBuf) -> Result<Self> {
        let pid = std::process::id();

        file.set_len(0).map_err(|e| LockError::io(&path, e))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| LockError::io(&path, e))?;
        write!(file, "{pid}").map_err(|e| LockError::io(&path, e))?;
        file.sync_data().map_err(|e| LockError::io(&path, e))?;

        tracing::debug!(path = %path.display(), pid, "Successfully acquired lock");
        Ok(Self {
            file: Some(file),
            path,
            owner_pid: pid,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID of the process that acquired the lock
    pub fn owner_pid(&self) -> u32 {
        self.owner_pid
    }

    /// Release the lock, reporting unlink failures other than lost
    /// permissions.
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        let mut result = Ok(());
        if std::process::id() == self.owner_pid {
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                // After dropping privileges the lock directory may not be writable
                Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                    tracing::debug!(path = %self.path.display(), "Lock file not removable; leaving it");
                }
                Err(e) => result = Err(LockError::io(&self.path, e)),
            }
        }

        if let Err(e) = file.set_len(0) {
            tracing::debug!(path = %self.path.display(), error = %e, "Failed to truncate lock file");
        }
        drop(file);

        tracing::debug!(path = %self.path.display(), "Released lock");
        result
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            tracing::warn!(error = %e, "Failed to clean up lock file");
        }
    }
}
