//! Single-instance execution lock for chargesync
//!
//! A run must be the only one touching the cursor and journal files. This
//! crate provides the [`LockManager`], which takes a non-blocking advisory
//! lock on a well-known file, reports which process holds it on contention
//! and reclaims it from holders older than a configured timeout.
//!
//! OS specifics live behind the [`LockPlatform`] trait; [`PosixLockPlatform`]
//! implements it with `fcntl` record locks.

pub mod error;
pub mod manager;
pub mod platform;
#[cfg(unix)]
pub mod posix;

pub use error::{LockError, Result};
pub use manager::{LockGuard, LockManager, LockOptions, StalePolicy};
pub use platform::LockPlatform;
#[cfg(unix)]
pub use posix::PosixLockPlatform;
