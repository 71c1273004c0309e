// SPDX-License-Identifier: MIT
//
// Raw-mode controller — canonical/echo transitions and their undo.
//
// Entering raw mode always re-reads the terminal first. Whatever the line
// discipline is at that moment becomes the `working` snapshot, and that is
// what gets put back afterwards. Never trust a cached copy: another part of
// the program (or a previous, partially failed restore) may have changed it.
//
// Every operation that touches modes goes through `RawModeGuard`. The guard
// remembers the snapshot taken on entry and restores exactly that on drop,
// so nested guards unwind correctly and an early `?` return or a panic
// can't leave the terminal without echo.

use std::ops::{Deref, DerefMut};

use crate::device::{Attributes, Device};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::store::Snapshot;

/// All echo-related local flags.
const ECHO_FLAGS: libc::tcflag_t = libc::ECHO | libc::ECHOE | libc::ECHOK | libc::ECHONL;

/// `VMIN`: a read returns as soon as one byte is available.
const READ_MIN_BYTES: libc::cc_t = 1;

/// `VTIME`: inter-byte timer in tenths of a second.
const READ_INTER_BYTE: libc::cc_t = 1;

// ─── RawMode ────────────────────────────────────────────────────────────────

/// How far to take the terminal out of cooked mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawMode {
    /// Character-at-a-time input, nothing echoed.
    Hidden,
    /// Character-at-a-time input, typed characters echoed.
    Echoed,
    /// Line-buffered input, nothing echoed (password-style).
    LineHidden,
}

impl RawMode {
    /// The classic two-way switch: echo always off, canonical mode optional.
    #[must_use]
    pub const fn from_canonical_off(canonical_off: bool) -> Self {
        if canonical_off { Self::Hidden } else { Self::LineHidden }
    }

    /// Derive raw attributes from a cooked snapshot.
    ///
    /// Only local flags and the `VMIN`/`VTIME` thresholds change; input,
    /// output and control modes are left as they were.
    #[must_use]
    pub fn apply(self, attrs: Attributes) -> Attributes {
        let mut lflag = attrs.local_flags();
        match self {
            Self::Hidden => lflag &= !(libc::ICANON | ECHO_FLAGS),
            Self::Echoed => {
                lflag &= !libc::ICANON;
                lflag |= libc::ECHO;
            }
            Self::LineHidden => lflag &= !ECHO_FLAGS,
        }
        attrs
            .with_local_flags(lflag)
            .with_control_char(libc::VMIN, READ_MIN_BYTES)
            .with_control_char(libc::VTIME, READ_INTER_BYTE)
    }
}

// ─── Session: mode transitions ──────────────────────────────────────────────

impl<D: Device> Session<D> {
    /// Turn echo off and, if `canonical_off`, line buffering too.
    ///
    /// Low-level: pair it with [`restore_terminal`](Self::restore_terminal)
    /// yourself, or use [`with_raw_mode`](Self::with_raw_mode) instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Os`] if the terminal can't be read or configured
    /// (and the session is not configured to exit on fatal errors).
    pub fn enter_raw_mode(&mut self, canonical_off: bool) -> Result<()> {
        self.enter(RawMode::from_canonical_off(canonical_off))
    }

    /// Capture the current state into `working`, then switch to `mode`.
    ///
    /// # Errors
    ///
    /// Same as [`enter_raw_mode`](Self::enter_raw_mode).
    pub fn enter(&mut self, mode: RawMode) -> Result<()> {
        let result = self.store.recapture(&self.device).and_then(|()| {
            let raw = mode.apply(self.store.working().attributes);
            self.device
                .set_attributes(&raw)
                .map_err(|e| Error::os("can't set terminal attributes", e))
        });
        if result.is_ok() {
            tracing::debug!(?mode, "entered raw mode");
        }
        self.escalate(result)
    }

    /// Put back the attributes and stdin flags saved by the last
    /// [`enter`](Self::enter).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Os`] if the terminal can't be configured.
    pub fn restore_terminal(&mut self) -> Result<()> {
        let working = *self.store.working();
        self.restore_to(working)
    }

    /// Apply `snapshot` and make it the working copy.
    pub(crate) fn restore_to(&mut self, snapshot: Snapshot) -> Result<()> {
        let result = snapshot.apply(&mut self.device);
        if result.is_ok() {
            self.store.set_working(snapshot);
            tracing::debug!("restored terminal mode");
        }
        self.escalate(result)
    }

    /// Switch stdin between blocking and non-blocking reads.
    ///
    /// Starts from the flags captured on entry, so restoring the working
    /// snapshot undoes it.
    pub(crate) fn set_input_blocking(&mut self, blocking: bool) -> Result<()> {
        let saved = self.store.working().flags;
        let flags = if blocking {
            saved.without_nonblocking()
        } else {
            saved.with_nonblocking()
        };
        let result = self
            .device
            .set_flags(flags)
            .map_err(|e| Error::os("can't set stdin flags", e));
        self.escalate(result)
    }

    /// Enter `mode` and return a guard that restores on drop.
    ///
    /// # Errors
    ///
    /// Same as [`enter`](Self::enter). Nothing needs restoring on error.
    pub fn raw_mode(&mut self, mode: RawMode) -> Result<RawModeGuard<'_, D>> {
        self.enter(mode)?;
        let saved = *self.store.working();
        Ok(RawModeGuard {
            session: self,
            saved,
            armed: true,
        })
    }

    /// Run `f` in `mode`, restoring the terminal afterwards on every path.
    ///
    /// ```no_run
    /// use stp_term::{RawMode, Session};
    ///
    /// let mut session = Session::init()?;
    /// let key = session.with_raw_mode(RawMode::Hidden, |s| s.read_key_hidden())?;
    /// # Ok::<(), stp_term::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the closure's error if it failed, otherwise any error from
    /// entering or leaving raw mode.
    pub fn with_raw_mode<T>(
        &mut self,
        mode: RawMode,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.raw_mode(mode)?;
        let outcome = f(&mut *guard);
        settle(outcome, guard.finish())
    }
}

/// Combine an operation's outcome with the restore that followed it.
///
/// A failed restore leaves the terminal raw, so its error wins; the
/// operation's own error is logged rather than lost.
pub(crate) fn settle<T>(outcome: Result<T>, restored: Result<()>) -> Result<T> {
    match (outcome, restored) {
        (outcome, Ok(())) => outcome,
        (Ok(_), Err(err)) => Err(err),
        (Err(op_err), Err(err)) => {
            tracing::error!(%err, %op_err, "terminal restore failed after error");
            Err(err)
        }
    }
}

// ─── RawModeGuard ───────────────────────────────────────────────────────────

/// Scoped raw mode. Derefs to the session it borrows.
///
/// Dropping the guard restores the snapshot taken when it was created.
/// Use [`finish`](Self::finish) to observe restore errors instead.
pub struct RawModeGuard<'s, D: Device> {
    pub(crate) session: &'s mut Session<D>,
    saved: Snapshot,
    armed: bool,
}

impl<D: Device> RawModeGuard<'_, D> {
    /// Restore the terminal now and report the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Os`] if the terminal can't be configured.
    pub fn finish(mut self) -> Result<()> {
        self.armed = false;
        self.session.restore_to(self.saved)
    }

    /// The state this guard will restore.
    #[must_use]
    pub const fn saved(&self) -> &Snapshot {
        &self.saved
    }
}

impl<D: Device> Deref for RawModeGuard<'_, D> {
    type Target = Session<D>;

    fn deref(&self) -> &Session<D> {
        self.session
    }
}

impl<D: Device> DerefMut for RawModeGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut Session<D> {
        self.session
    }
}

impl<D: Device> Drop for RawModeGuard<'_, D> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(err) = self.session.restore_to(self.saved) {
                tracing::error!(%err, "failed to restore terminal mode");
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
