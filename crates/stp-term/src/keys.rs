// SPDX-License-Identifier: MIT
//
// Key detection: blocking reads, non-blocking checks and the batched poller.
//
// All reads take the pushback queue first. The queue holds keystrokes that
// arrived while something else was reading stdin (a cursor position query)
// and bytes a check looked at but didn't consume.
//
// Blocking reads wait for exactly one byte. Checks put stdin in O_NONBLOCK,
// sleep the poll interval so a key pressed "just now" has time to land, and
// try once. Either way the terminal is back in its previous mode before the
// call returns.
//
// `Poller` splits a check into setup and step. A loop that redraws a clock
// and checks for a key on every frame pays for the mode switch once instead
// of twice per frame.

use std::io::Write;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use crate::device::{ByteRead, Device};
use crate::error::{Error, Result};
use crate::raw_mode::{RawMode, RawModeGuard, settle};
use crate::session::Session;

/// How long a blocking read waits between retries if the device reports
/// "no data" despite blocking mode.
const BLOCKING_RETRY: Duration = Duration::from_millis(100);

// ─── Session: key reads ──────────────────────────────────────────────────────

impl<D: Device> Session<D> {
    /// Wait for one key without echoing it.
    ///
    /// # Errors
    ///
    /// [`Error::EndOfInput`] if stdin is closed; [`Error::Os`] if raw mode
    /// can't be entered or left.
    pub fn read_key_hidden(&mut self) -> Result<u8> {
        self.device.flush()?;
        self.with_raw_mode(RawMode::Hidden, Self::read_blocking)
    }

    /// Wait for one key and echo it.
    ///
    /// # Errors
    ///
    /// Same as [`read_key_hidden`](Self::read_key_hidden).
    pub fn read_key_echoed(&mut self) -> Result<u8> {
        self.device.flush()?;
        self.with_raw_mode(RawMode::Echoed, |s| {
            let queued = !s.pushback.is_empty();
            let key = s.read_blocking()?;
            // The terminal only echoes what it delivers itself.
            if queued {
                s.device.write_all(&[key])?;
                s.device.flush()?;
            }
            Ok(key)
        })
    }

    /// Check for a key without waiting longer than the poll interval.
    ///
    /// Returns `None` if nothing was typed. A key that is returned is
    /// consumed.
    ///
    /// # Errors
    ///
    /// [`Error::EndOfInput`] if stdin is closed; [`Error::Os`] if raw mode
    /// can't be entered or left.
    pub fn poll_key(&mut self) -> Result<Option<u8>> {
        if let Some(key) = self.pushback.pop_front() {
            return Ok(Some(key));
        }
        let mut poller = self.begin_poll()?;
        let key = poller.poll_once();
        settle(key, poller.finish())
    }

    /// Whether a key is waiting. Doesn't consume it.
    ///
    /// # Errors
    ///
    /// Same as [`poll_key`](Self::poll_key).
    pub fn key_available(&mut self) -> Result<bool> {
        if !self.pushback.is_empty() {
            return Ok(true);
        }
        match self.poll_key()? {
            Some(key) => {
                self.unread(key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Enter hidden, non-blocking mode once for a series of key checks.
    ///
    /// ```no_run
    /// use std::io::Write;
    /// use stp_term::Session;
    ///
    /// let mut session = Session::init()?;
    /// let mut poller = session.begin_poll()?;
    /// let key = loop {
    ///     poller.goto(1, 1)?;
    ///     write!(poller, "waiting…")?;
    ///     poller.flush()?;
    ///     if let Some(key) = poller.poll_once()? {
    ///         break key;
    ///     }
    ///     std::thread::sleep(poller.poll_interval());
    /// };
    /// poller.finish()?;
    /// # Ok::<(), stp_term::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// [`Error::Os`] if the terminal can't be configured.
    pub fn begin_poll(&mut self) -> Result<Poller<'_, D>> {
        self.device.flush()?;
        let mut guard = self.raw_mode(RawMode::Hidden)?;
        guard.set_input_blocking(false)?;
        guard.pause();
        Ok(Poller { guard })
    }

    /// One blocking byte, pushback first.
    fn read_blocking(&mut self) -> Result<u8> {
        if let Some(key) = self.pushback.pop_front() {
            return Ok(key);
        }
        self.set_input_blocking(true)?;
        loop {
            match self.device.read_byte()? {
                ByteRead::Byte(key) => return Ok(key),
                ByteRead::Eof => return Err(Error::EndOfInput),
                ByteRead::WouldBlock => {
                    self.device.wait_readable(BLOCKING_RETRY)?;
                }
            }
        }
    }
}

// ─── Poller ──────────────────────────────────────────────────────────────────

/// A session held in hidden, non-blocking mode. Derefs to the session.
///
/// Dropping the poller restores the previous mode; use
/// [`finish`](Self::finish) to see restore errors.
pub struct Poller<'s, D: Device> {
    guard: RawModeGuard<'s, D>,
}

impl<D: Device> Poller<'_, D> {
    /// Try to read one key. `None` if nothing is waiting.
    ///
    /// # Errors
    ///
    /// [`Error::EndOfInput`] if stdin is closed; [`Error::Io`] if the read
    /// fails.
    pub fn poll_once(&mut self) -> Result<Option<u8>> {
        match self.guard.next_byte()? {
            ByteRead::Byte(key) => Ok(Some(key)),
            ByteRead::WouldBlock => Ok(None),
            ByteRead::Eof => Err(Error::EndOfInput),
        }
    }

    /// Leave polling mode.
    ///
    /// # Errors
    ///
    /// [`Error::Os`] if the terminal can't be configured.
    pub fn finish(self) -> Result<()> {
        self.guard.finish()
    }
}

impl<D: Device> Deref for Poller<'_, D> {
    type Target = Session<D>;

    fn deref(&self) -> &Session<D> {
        &self.guard
    }
}

impl<D: Device> DerefMut for Poller<'_, D> {
    fn deref_mut(&mut self) -> &mut Session<D> {
        &mut self.guard
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
