//! Cross-process lock tests against the real `fcntl` platform.
//!
//! A second copy of this test binary is spawned to hold the lock, since
//! record locks never conflict within a single process.

#![cfg(target_os = "linux")]

use chargesync_lock::{LockError, LockManager, LockOptions, PosixLockPlatform, StalePolicy};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tempfile::tempdir;

const HOLD_ENV: &str = "CHARGESYNC_TEST_HOLD_LOCK";
const HOLD_SECS_ENV: &str = "CHARGESYNC_TEST_HOLD_SECS";

fn fast(stale: StalePolicy) -> LockOptions {
    LockOptions {
        stale,
        max_attempts: 2,
        backoff_unit: Duration::ZERO,
        reclaim_delay: Duration::from_millis(200),
    }
}

/// Spawn a helper process that holds the lock at `path` until killed.
fn spawn_holder(path: &Path) -> Child {
    spawn_holder_for(path, Duration::from_secs(60))
}

/// Spawn a helper process that holds the lock at `path`, then releases it
/// and exits once `hold` has passed.
fn spawn_holder_for(path: &Path, hold: Duration) -> Child {
    let mut child = Command::new(std::env::current_exe().unwrap())
        .args(["hold_lock_helper", "--exact", "--ignored", "--nocapture"])
        .env(HOLD_ENV, path)
        .env(HOLD_SECS_ENV, hold.as_secs_f64().to_string())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn lock holder");

    let stdout = child.stdout.take().unwrap();
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = lines
            .next()
            .expect("holder exited before taking the lock")
            .unwrap();
        if line.contains("holder-locked") {
            break;
        }
    }
    child
}

#[test]
#[ignore = "helper process for the contention tests"]
fn hold_lock_helper() {
    let Ok(path) = std::env::var(HOLD_ENV) else {
        return;
    };
    let hold = std::env::var(HOLD_SECS_ENV)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs_f64)
        .unwrap_or(Duration::from_secs(60));

    let manager = LockManager::new(PosixLockPlatform, fast(StalePolicy::Never));
    let guard = manager.acquire(Path::new(&path)).unwrap();
    println!("holder-locked");
    std::thread::sleep(hold);
    guard.release().unwrap();
}

#[test]
fn acquire_and_release_uncontended() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chargesync.lock");

    let guard = LockManager::new(PosixLockPlatform, fast(StalePolicy::Never))
        .acquire(&path)
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        std::process::id().to_string()
    );

    guard.release().unwrap();
    assert!(!path.exists());
}

#[test]
fn contended_lock_reports_holder_pid() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chargesync.lock");
    let mut holder = spawn_holder(&path);

    let result = LockManager::new(PosixLockPlatform, fast(StalePolicy::Never)).acquire(&path);

    holder.kill().unwrap();
    holder.wait().unwrap();
    match result {
        Err(LockError::Unavailable { holder: pid, .. }) => assert_eq!(pid, Some(holder.id())),
        other => panic!("expected Unavailable, got {other:?}"),
    }
}

#[test]
fn young_holder_survives_long_timeout() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chargesync.lock");
    let mut holder = spawn_holder(&path);

    let result =
        LockManager::new(PosixLockPlatform, fast(StalePolicy::from_secs(3600))).acquire(&path);

    assert!(result.is_err());
    assert!(holder.try_wait().unwrap().is_none(), "holder should still run");
    holder.kill().unwrap();
    holder.wait().unwrap();
}

#[test]
fn stale_holder_is_reclaimed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chargesync.lock");
    let mut holder = spawn_holder(&path);
    std::thread::sleep(Duration::from_millis(100));

    let guard = LockManager::new(PosixLockPlatform, fast(StalePolicy::After(Duration::ZERO)))
        .acquire(&path)
        .unwrap();

    let status = holder.wait().unwrap();
    assert!(!status.success(), "holder should have been killed");
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        std::process::id().to_string()
    );
    guard.release().unwrap();
}

#[test]
fn released_and_recreated_lock_is_not_shared() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("chargesync.lock");

    // First holder releases, unlinking the file, while we back off
    let mut first = spawn_holder_for(&path, Duration::from_secs(1));
    // A newcomer then creates a fresh file and locks it before we retry
    let newcomer = {
        let path = path.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(1600));
            spawn_holder(&path)
        })
    };

    let options = LockOptions {
        stale: StalePolicy::Never,
        max_attempts: 2,
        backoff_unit: Duration::from_millis(2500),
        reclaim_delay: Duration::ZERO,
    };
    let result = LockManager::new(PosixLockPlatform, options).acquire(&path);

    let mut newcomer = newcomer.join().unwrap();
    let newcomer_alive = newcomer.try_wait().unwrap().is_none();
    newcomer.kill().unwrap();
    newcomer.wait().unwrap();
    first.wait().unwrap();

    assert!(newcomer_alive, "newcomer should still hold the lock");
    match result {
        Err(LockError::Unavailable { holder, .. }) => assert_eq!(holder, Some(newcomer.id())),
        Ok(_) => panic!("lock acquired while the newcomer held it"),
        Err(other) => panic!("expected Unavailable, got {other:?}"),
    }
}
