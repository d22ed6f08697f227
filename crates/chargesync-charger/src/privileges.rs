//! Switching to the unprivileged charging account

use std::ffi::CString;
use std::{io, mem, ptr};

use crate::error::{ChargerError, Result};

/// Account identity looked up from the password database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    pub uid: libc::uid_t,
    pub gid: libc::gid_t,
}

/// Look up `username` with `getpwnam_r`.
pub fn lookup(username: &str) -> Result<Account> {
    let name = c_name(username)?;
    let mut buf = vec![0 as libc::c_char; 1024];
    // SAFETY: passwd is a plain C struct; all-zero is a valid bit pattern
    let mut passwd = unsafe { mem::zeroed::<libc::passwd>() };
    let mut result = ptr::null_mut::<libc::passwd>();

    loop {
        // SAFETY: every pointer refers to a live local, `buf.len()` is the
        // true capacity of `buf`, and the strings `passwd` points into stay
        // inside `buf`, which outlives every read of them below
        let r = unsafe {
            libc::getpwnam_r(
                name.as_ptr(),
                &mut passwd,
                buf.as_mut_ptr(),
                buf.len(),
                &mut result,
            )
        };
        if r != libc::ERANGE {
            break;
        }
        let new_size = buf.len().saturating_mul(2);
        buf.resize(new_size, 0);
    }

    if result.is_null() {
        return Err(ChargerError::UnknownUser(username.to_string()));
    }
    Ok(Account {
        uid: passwd.pw_uid,
        gid: passwd.pw_gid,
    })
}

fn c_name(username: &str) -> Result<CString> {
    CString::new(username).map_err(|_| ChargerError::UnknownUser(username.to_string()))
}

/// Identity the process currently runs as
fn current() -> Account {
    // SAFETY: geteuid and getegid cannot fail and touch no memory
    unsafe {
        Account {
            uid: libc::geteuid(),
            gid: libc::getegid(),
        }
    }
}

/// Become `username`: supplementary groups, then group, then user.
///
/// The supplementary groups are replaced with those of `username` so none
/// of the starting account's groups survive the switch. Already running as
/// `username` is a no-op. Lacking the permission to switch (`EPERM`, e.g.
/// when not started as root) is logged and tolerated; every other failure
/// is an error.
pub fn drop_privileges(username: &str) -> Result<()> {
    let account = lookup(username)?;
    if current() == account {
        tracing::debug!(user = username, "Already running as the charging account");
        return Ok(());
    }

    let name = c_name(username)?;
    // SAFETY: `name` is a valid NUL-terminated string for the duration of
    // the call; the set*id calls take plain integers
    let switched = unsafe {
        libc::initgroups(name.as_ptr(), account.gid as _) == 0
            && libc::setgid(account.gid) == 0
            && libc::setuid(account.uid) == 0
    };
    if switched {
        tracing::debug!(user = username, uid = account.uid, gid = account.gid, "Dropped privileges");
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EPERM) {
        tracing::warn!(user = username, "Unable to drop privileges; continuing");
        Ok(())
    } else {
        Err(ChargerError::Privileges {
            user: username.to_string(),
            source: err,
        })
    }
}
