//! Platform capability needed by the lock manager

use std::fs::File;
use std::io;
use std::time::Duration;

/// OS operations behind the execution lock.
///
/// Implementations are expected to be stateless; the manager owns the file.
pub trait LockPlatform {
    /// Try to take an exclusive, non-blocking lock on the whole file.
    ///
    /// Returns `Ok(false)` when another process holds the lock.
    fn try_lock(&self, file: &File) -> io::Result<bool>;

    /// PID of the process currently holding a conflicting lock, as reported
    /// by the OS lock table. `None` means nobody holds it anymore.
    fn query_holder_pid(&self, file: &File) -> io::Result<Option<u32>>;

    /// Time elapsed since the given process started.
    fn holder_age(&self, pid: u32) -> io::Result<Duration>;

    /// Forcibly terminate the given process. A process that already exited
    /// is not an error.
    fn terminate(&self, pid: u32) -> io::Result<()>;
}
