// SPDX-License-Identifier: MIT
//
// Session — the single owner of the terminal.
//
// Opening a session snapshots the terminal
// (the `original` copy that `defaults` restores), installs the SIGIO guard,
// and from then on is the only way to reach any mode-dependent operation.
// There is no "before init" state to get wrong; if you have a session, the
// baseline exists.
//
// The operations themselves are spread over the modules that own them:
// raw-mode transitions in `raw_mode.rs`, cursor queries in `query.rs`,
// key reads in `keys.rs`. This file holds the struct, its lifecycle, the
// fatal-error policy, and the thin presentation helpers.
//
// Dropping a session restores the original terminal state.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::ansi;
use crate::color::Color;
use crate::config::Config;
use crate::device::{ByteRead, Device, Tty};
use crate::error::{self, Error, Result};
use crate::signal::SigioGuard;
use crate::store::ModeStore;

/// Set while a [`Session<Tty>`] exists. The real terminal has one owner.
static TTY_CLAIMED: AtomicBool = AtomicBool::new(false);

/// An initialized terminal.
///
/// # Example
///
/// ```no_run
/// use std::io::Write;
/// use stp_term::{Color, Session};
///
/// let mut term = Session::init()?;
/// term.text_background(Color::BLUE)?;
/// term.clear_screen()?;
/// term.goto(10, 5)?;
/// write!(term, "press any key")?;
/// let key = term.read_key_hidden()?;
/// term.defaults()?;
/// # Ok::<(), stp_term::Error>(())
/// ```
pub struct Session<D: Device = Tty> {
    pub(crate) device: D,
    pub(crate) store: ModeStore,
    /// Bytes read from the device but not yet consumed by a key read.
    pub(crate) pushback: VecDeque<u8>,
    pub(crate) config: Config,
    _sigio: SigioGuard,
    owns_tty: bool,
}

impl Session<Tty> {
    /// Take over the controlling terminal with default settings.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyInitialized`] if another session owns the terminal;
    /// [`Error::Os`] if stdin isn't a terminal (only returned when the
    /// config doesn't exit on fatal errors, which the default does).
    pub fn init() -> Result<Self> {
        Self::init_with(Config::default())
    }

    /// Take over the controlling terminal with explicit settings.
    ///
    /// # Errors
    ///
    /// Same as [`init`](Self::init).
    pub fn init_with(config: Config) -> Result<Self> {
        if TTY_CLAIMED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::AlreadyInitialized);
        }
        match Self::open(Tty::new(), config) {
            Ok(mut session) => {
                session.owns_tty = true;
                Ok(session)
            }
            Err(err) => {
                TTY_CLAIMED.store(false, Ordering::Release);
                Err(err)
            }
        }
    }
}

impl<D: Device> Session<D> {
    /// Start a session on any device.
    ///
    /// # Errors
    ///
    /// [`Error::Os`] if the device state can't be read or the SIGIO guard
    /// can't be installed (only returned when not exiting on fatal errors).
    pub fn open(device: D, config: Config) -> Result<Self> {
        let store = escalate(&config, ModeStore::capture(&device))?;
        let sigio = escalate(&config, SigioGuard::install())?;
        tracing::debug!(?config, original = ?store.original(), "terminal session started");
        Ok(Self {
            device,
            store,
            pushback: VecDeque::new(),
            config,
            _sigio: sigio,
            owns_tty: false,
        })
    }

    /// Restore the terminal to the state captured at startup.
    ///
    /// Undoes every raw-mode change, including ones a caller forgot to
    /// restore. Safe to call any number of times.
    ///
    /// # Errors
    ///
    /// [`Error::Os`] if the terminal can't be configured.
    pub fn defaults(&mut self) -> Result<()> {
        let result = self.store.original().apply(&mut self.device);
        if result.is_ok() {
            self.store.reset_working();
            tracing::debug!("terminal defaults restored");
        }
        self.escalate(result)
    }

    /// Re-read the terminal's current state into the working copy.
    ///
    /// # Errors
    ///
    /// [`Error::Os`] if the terminal can't be read.
    pub fn save_state(&mut self) -> Result<()> {
        let result = self.store.recapture(&self.device);
        self.escalate(result)
    }

    /// The original/working snapshots.
    #[inline]
    #[must_use]
    pub const fn store(&self) -> &ModeStore {
        &self.store
    }

    /// Current settings.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Delay applied before each non-blocking key check.
    #[inline]
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    /// Change the poll delay. Zero disables it.
    pub const fn set_poll_interval(&mut self, interval: Duration) {
        self.config.poll_interval = interval;
    }

    /// The underlying device.
    #[inline]
    #[must_use]
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// The underlying device, mutably.
    #[inline]
    pub const fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Push a byte back so the next key read returns it (like `ungetc`).
    pub fn unread(&mut self, byte: u8) {
        self.pushback.push_front(byte);
    }

    /// Number of bytes waiting in the pushback queue.
    #[inline]
    #[must_use]
    pub fn pending_keys(&self) -> usize {
        self.pushback.len()
    }

    // ── Presentation ────────────────────────────────────────────────

    /// Clear the screen and home the cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn clear_screen(&mut self) -> Result<()> {
        Ok(ansi::clear_screen(&mut self.device)?)
    }

    /// Move the cursor to column `x`, row `y` (1-based).
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn goto(&mut self, x: u16, y: u16) -> Result<()> {
        Ok(ansi::goto(&mut self.device, x, y)?)
    }

    /// Set the text color (and underline/blink/bright attribute).
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn text_color(&mut self, color: Color) -> Result<()> {
        Ok(ansi::text_color(&mut self.device, color)?)
    }

    /// Set the background color. Bright colors are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn text_background(&mut self, color: Color) -> Result<()> {
        Ok(ansi::text_background(&mut self.device, color)?)
    }

    /// Back to the terminal's default colors and attributes.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn restore_color(&mut self) -> Result<()> {
        Ok(ansi::reset(&mut self.device)?)
    }

    // ── Internals shared by the operation modules ───────────────────

    /// Apply the fatal-error policy to `result`.
    pub(crate) fn escalate<T>(&self, result: Result<T>) -> Result<T> {
        escalate(&self.config, result)
    }

    /// Next input byte: pushback queue first, then the device.
    pub(crate) fn next_byte(&mut self) -> Result<ByteRead> {
        if let Some(byte) = self.pushback.pop_front() {
            return Ok(ByteRead::Byte(byte));
        }
        Ok(self.device.read_byte()?)
    }

    /// Sleep for the poll interval, if any.
    pub(crate) fn pause(&self) {
        if !self.config.poll_interval.is_zero() {
            thread::sleep(self.config.poll_interval);
        }
    }
}

/// Exit on fatal errors when the config says so; pass everything else on.
fn escalate<T>(config: &Config, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        if err.is_fatal() && config.exit_on_fatal {
            tracing::error!(%err, "fatal terminal error");
            error::fatal(err);
        }
    }
    result
}

impl<D: Device> Write for Session<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.device.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.device.flush()
    }
}

impl<D: Device> Drop for Session<D> {
    fn drop(&mut self) {
        let _ = self.device.flush();
        if let Err(err) = self.defaults() {
            tracing::error!(%err, "failed to restore terminal defaults");
        }
        if self.owns_tty {
            TTY_CLAIMED.store(false, Ordering::Release);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
