// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Signal guard — keep SIGIO from killing the process.
//
// Toggling O_NONBLOCK on a terminal descriptor can make the kernel deliver
// SIGIO, whose default disposition terminates the process. The guard
// installs an empty handler for as long as any session is alive and puts
// the previous disposition back when the last one goes away.
//
// Installation is reference-counted behind a mutex so that several
// sessions (the tests open many in parallel) share one installation.

use std::io;
use std::sync::{Mutex, PoisonError};

use crate::error::{Error, Result};

/// Number of live guards and the disposition to restore after the last.
struct Registration {
    holders: usize,
    previous: Option<libc::sigaction>,
}

static REGISTRATION: Mutex<Registration> = Mutex::new(Registration {
    holders: 0,
    previous: None,
});

extern "C" fn on_sigio(_sig: libc::c_int) {}

/// RAII handle on the SIGIO handler.
#[derive(Debug)]
pub struct SigioGuard {
    _private: (),
}

impl SigioGuard {
    /// Install the no-op SIGIO handler (or join an existing installation).
    ///
    /// # Errors
    ///
    /// [`Error::Os`] if `sigaction` fails.
    pub fn install() -> Result<Self> {
        let mut reg = REGISTRATION.lock().unwrap_or_else(PoisonError::into_inner);
        if reg.holders == 0 {
            let previous = install_handler().map_err(|e| Error::os("can't install SIGIO handler", e))?;
            reg.previous = Some(previous);
            tracing::debug!("SIGIO handler installed");
        }
        reg.holders += 1;
        Ok(Self { _private: () })
    }

    /// Whether at least one guard is alive.
    #[must_use]
    pub fn is_installed() -> bool {
        REGISTRATION
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .holders
            > 0
    }
}

impl Drop for SigioGuard {
    fn drop(&mut self) {
        let mut reg = REGISTRATION.lock().unwrap_or_else(PoisonError::into_inner);
        reg.holders = reg.holders.saturating_sub(1);
        if reg.holders == 0 {
            if let Some(previous) = reg.previous.take() {
                match restore_handler(&previous) {
                    Ok(()) => tracing::debug!("SIGIO handler removed"),
                    Err(err) => tracing::error!(%err, "failed to restore SIGIO disposition"),
                }
            }
        }
    }
}

/// Install `on_sigio`, returning the disposition it replaced.
fn install_handler() -> io::Result<libc::sigaction> {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = on_sigio as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&raw mut sa.sa_mask);

        let mut previous: libc::sigaction = std::mem::zeroed();
        if libc::sigaction(libc::SIGIO, &raw const sa, &raw mut previous) == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(previous)
    }
}

/// Put back a disposition saved by `install_handler`.
fn restore_handler(previous: &libc::sigaction) -> io::Result<()> {
    if unsafe { libc::sigaction(libc::SIGIO, previous, std::ptr::null_mut()) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// The disposition currently registered for SIGIO.
#[cfg(test)]
fn current_disposition() -> libc::sigaction {
    unsafe {
        let mut current: libc::sigaction = std::mem::zeroed();
        libc::sigaction(libc::SIGIO, std::ptr::null(), &raw mut current);
        current
    }
}

/// The handler currently registered for SIGIO.
#[cfg(test)]
fn current_handler() -> usize {
    current_disposition().sa_sigaction
}

// ─── Tests ───────────────────────────────────────────────────────────────────
