//! POSIX implementation of the lock platform
//!
//! Uses `fcntl` record locks rather than `flock`: only record locks let a
//! contending process ask the kernel which PID holds the lock (`F_GETLK`).

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use crate::platform::LockPlatform;

/// `fcntl`-based lock platform with process ages read from `/proc` on Linux.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixLockPlatform;

impl PosixLockPlatform {
    pub fn new() -> Self {
        Self
    }
}

/// Whole-file write lock request.
fn whole_file_write_lock() -> libc::flock {
    // SAFETY: flock is a plain C struct; all-zero is a valid bit pattern
    let mut fl: libc::flock = unsafe { std::mem::zeroed() };
    fl.l_type = libc::F_WRLCK as _;
    fl.l_whence = libc::SEEK_SET as _;
    fl.l_start = 0;
    fl.l_len = 0;
    fl
}

impl LockPlatform for PosixLockPlatform {
    fn try_lock(&self, file: &File) -> io::Result<bool> {
        let fl = whole_file_write_lock();
        // SAFETY: fd is owned by `file` for the duration of the call and `fl`
        // outlives it
        let ret = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_SETLK, &fl as *const libc::flock) };
        if ret == 0 {
            return Ok(true);
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EACCES) | Some(libc::EAGAIN) => Ok(false),
            _ => Err(err),
        }
    }

    fn query_holder_pid(&self, file: &File) -> io::Result<Option<u32>> {
        let mut fl = whole_file_write_lock();
        // SAFETY: as above; F_GETLK writes the conflicting lock back into `fl`
        let ret = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_GETLK, &mut fl as *mut libc::flock) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }

        if fl.l_type == libc::F_UNLCK as _ || fl.l_pid <= 0 {
            return Ok(None);
        }
        Ok(Some(fl.l_pid as u32))
    }

    #[cfg(target_os = "linux")]
    fn holder_age(&self, pid: u32) -> io::Result<Duration> {
        let stat = std::fs::read_to_string(format!("/proc/{pid}/stat"))?;
        let uptime = std::fs::read_to_string("/proc/uptime")?;
        process_age(&stat, &uptime, clock_ticks_per_second())
    }

    /// Only Linux exposes process start times in `/proc`; elsewhere the age
    /// is unknown and holders are never timed out.
    #[cfg(not(target_os = "linux"))]
    fn holder_age(&self, pid: u32) -> io::Result<Duration> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("age of process {pid} unknown on this platform"),
        ))
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        let pid = libc::pid_t::try_from(pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

        // SAFETY: kill has no memory-safety preconditions
        let ret = unsafe { libc::kill(pid, libc::SIGKILL) };
        if ret == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(err)
    }
}

#[cfg(target_os = "linux")]
fn clock_ticks_per_second() -> u64 {
    // SAFETY: sysconf has no memory-safety preconditions
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    u64::try_from(ticks).ok().filter(|t| *t > 0).unwrap_or(100)
}

/// Age of a process from its `/proc/<pid>/stat` line and `/proc/uptime`.
///
/// `starttime` is field 22 of the stat line, in clock ticks since boot. The
/// command name (field 2) may contain spaces and parentheses, so fields are
/// counted from the last `)`.
#[cfg(target_os = "linux")]
fn process_age(stat: &str, uptime: &str, ticks_per_sec: u64) -> io::Result<Duration> {
    let malformed = |what: &str| io::Error::new(io::ErrorKind::InvalidData, what.to_string());

    let after_comm = stat
        .rfind(')')
        .map(|i| &stat[i + 1..])
        .ok_or_else(|| malformed("stat line without command name"))?;
    let start_ticks: u64 = after_comm
        .split_whitespace()
        .nth(19)
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| malformed("stat line without start time"))?;

    let uptime_secs: f64 = uptime
        .split_whitespace()
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| malformed("unparseable uptime"))?;

    let started = Duration::from_secs_f64(start_ticks as f64 / ticks_per_sec as f64);
    Ok(Duration::from_secs_f64(uptime_secs).saturating_sub(started))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn uncontended_lock_succeeds() {
        let dir = tempdir().unwrap();
        let file = File::create(dir.path().join("lock")).unwrap();

        assert!(PosixLockPlatform.try_lock(&file).unwrap());
    }

    #[test]
    fn own_lock_is_not_reported_as_conflict() {
        let dir = tempdir().unwrap();
        let file = File::create(dir.path().join("lock")).unwrap();
        assert!(PosixLockPlatform.try_lock(&file).unwrap());

        // Record locks never conflict with the owning process
        assert_eq!(PosixLockPlatform.query_holder_pid(&file).unwrap(), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn own_process_has_an_age() {
        let age = PosixLockPlatform.holder_age(std::process::id()).unwrap();
        assert!(age < Duration::from_secs(24 * 3600));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn process_age_counts_fields_after_command_name() {
        // comm contains a space and a parenthesis
        let stat = "1234 (my (odd) proc) S 1 1234 1234 0 -1 4194560 100 0 0 0 \
                    5 3 0 0 20 0 1 0 50000 10000000 200 18446744073709551615";
        let age = process_age(stat, "1000.50 3000.00\n", 100).unwrap();
        assert_eq!(age, Duration::from_secs_f64(500.5));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn process_age_rejects_truncated_stat() {
        assert!(process_age("1234 (short) S 1", "10.0 1.0", 100).is_err());
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn age_is_unknown_off_linux() {
        let err = PosixLockPlatform.holder_age(std::process::id()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn age_of_missing_process_is_an_error() {
        // PIDs are bounded well below i32::MAX on every supported kernel
        assert!(PosixLockPlatform.holder_age(i32::MAX as u32).is_err());
    }
}
