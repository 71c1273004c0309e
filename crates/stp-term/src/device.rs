// SPDX-License-Identifier: MIT
//
// Terminal device — the line between the session and the OS.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), fcntl, poll, isatty and raw fd reads. These are the standard
// POSIX interfaces for terminal control; there is no safe alternative.
// Each unsafe block is a single libc call on stdin.
#![allow(unsafe_code)]
//
// The session never calls libc directly. It talks to a `Device`, which
// knows how to read and write the line discipline (termios), the stdin
// descriptor flags (O_NONBLOCK), read one byte, and wait for input with a
// timeout. `Tty` is the real thing on fds 0 and 1. Tests drive the same
// session code through an in-memory terminal instead.
//
// Reads are one byte at a time straight from fd 0. There is no userspace
// input buffer here: the session owns the only one (its pushback queue),
// so a byte is never stranded somewhere a later read can't see it.

use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

// ─── Attributes ─────────────────────────────────────────────────────────────

/// Snapshot of the terminal line discipline (`struct termios`).
///
/// Equality compares the four flag words and the control-character array,
/// which is everything `tcsetattr` with `TCSANOW` cares about. Line speed
/// fields are ignored; we never touch them.
#[derive(Clone, Copy)]
pub struct Attributes(libc::termios);

impl Attributes {
    /// Wrap a raw termios value.
    #[must_use]
    pub const fn from_termios(termios: libc::termios) -> Self {
        Self(termios)
    }

    /// The wrapped termios value.
    #[must_use]
    pub const fn as_termios(&self) -> &libc::termios {
        &self.0
    }

    /// Local mode flags (`c_lflag`): ICANON, ECHO and friends.
    #[must_use]
    pub const fn local_flags(&self) -> libc::tcflag_t {
        self.0.c_lflag
    }

    /// Replace the local mode flags.
    #[must_use]
    pub fn with_local_flags(mut self, flags: libc::tcflag_t) -> Self {
        self.0.c_lflag = flags;
        self
    }

    /// A control character slot, e.g. `libc::VMIN`.
    #[must_use]
    pub const fn control_char(&self, index: usize) -> libc::cc_t {
        self.0.c_cc[index]
    }

    /// Replace a control character slot.
    #[must_use]
    pub fn with_control_char(mut self, index: usize, value: libc::cc_t) -> Self {
        self.0.c_cc[index] = value;
        self
    }

    /// A typical cooked-mode terminal: canonical input with full echo.
    #[cfg(test)]
    pub(crate) fn cooked() -> Self {
        let termios: libc::termios = unsafe { std::mem::zeroed() };
        Self(termios)
            .with_local_flags(
                libc::ICANON | libc::ECHO | libc::ECHOE | libc::ECHOK | libc::ISIG | libc::IEXTEN,
            )
            .with_control_char(libc::VMIN, 1)
            .with_control_char(libc::VTIME, 0)
    }
}

impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&self.0, &other.0);
        a.c_iflag == b.c_iflag
            && a.c_oflag == b.c_oflag
            && a.c_cflag == b.c_cflag
            && a.c_lflag == b.c_lflag
            && a.c_cc == b.c_cc
    }
}

impl Eq for Attributes {}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attributes")
            .field("iflag", &format_args!("{:#x}", self.0.c_iflag))
            .field("oflag", &format_args!("{:#x}", self.0.c_oflag))
            .field("cflag", &format_args!("{:#x}", self.0.c_cflag))
            .field("lflag", &format_args!("{:#x}", self.0.c_lflag))
            .field("vmin", &self.0.c_cc[libc::VMIN])
            .field("vtime", &self.0.c_cc[libc::VTIME])
            .finish_non_exhaustive()
    }
}

// ─── Descriptor Flags ───────────────────────────────────────────────────────

/// File status flags of stdin (`fcntl(F_GETFL)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DescriptorFlags(libc::c_int);

impl DescriptorFlags {
    /// Wrap a raw flag word.
    #[must_use]
    pub const fn from_bits(bits: libc::c_int) -> Self {
        Self(bits)
    }

    /// The raw flag word.
    #[must_use]
    pub const fn bits(self) -> libc::c_int {
        self.0
    }

    /// Whether `O_NONBLOCK` is set.
    #[must_use]
    pub const fn is_nonblocking(self) -> bool {
        self.0 & libc::O_NONBLOCK != 0
    }

    /// The same flags with `O_NONBLOCK` set.
    #[must_use]
    pub const fn with_nonblocking(self) -> Self {
        Self(self.0 | libc::O_NONBLOCK)
    }

    /// The same flags with `O_NONBLOCK` cleared.
    #[must_use]
    pub const fn without_nonblocking(self) -> Self {
        Self(self.0 & !libc::O_NONBLOCK)
    }
}

// ─── Device ─────────────────────────────────────────────────────────────────

/// Outcome of a single-byte read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRead {
    /// One byte arrived.
    Byte(u8),
    /// Non-blocking mode and nothing is waiting.
    WouldBlock,
    /// The input side is closed.
    Eof,
}

/// A character terminal the session can drive.
///
/// Output goes through the [`Write`] supertrait. Implementations should
/// buffer output until [`flush`](Write::flush); the session flushes before
/// every read that depends on what it wrote.
pub trait Device: Write {
    /// Read the current line discipline.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the attributes can't be read.
    fn attributes(&self) -> io::Result<Attributes>;

    /// Apply a line discipline immediately.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the attributes can't be applied.
    fn set_attributes(&mut self, attrs: &Attributes) -> io::Result<()>;

    /// Read the input descriptor's status flags.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the flags can't be read.
    fn flags(&self) -> io::Result<DescriptorFlags>;

    /// Replace the input descriptor's status flags.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the flags can't be set.
    fn set_flags(&mut self, flags: DescriptorFlags) -> io::Result<()>;

    /// Read exactly one byte, honoring the current blocking mode.
    ///
    /// # Errors
    ///
    /// Returns any read error other than "would block".
    fn read_byte(&mut self) -> io::Result<ByteRead>;

    /// Wait up to `timeout` for input. `Ok(false)` means it timed out.
    ///
    /// # Errors
    ///
    /// Returns the OS error if waiting fails.
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool>;
}

// ─── Tty ────────────────────────────────────────────────────────────────────

/// Check whether stdin is connected to a terminal (TTY).
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 }
}

/// The controlling terminal: attributes and input on fd 0, output on stdout.
#[derive(Debug)]
pub struct Tty {
    out: io::Stdout,
}

impl Tty {
    /// Handle on the process's stdin/stdout.
    #[must_use]
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for Tty {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for Tty {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Device for Tty {
    fn attributes(&self) -> io::Result<Attributes> {
        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(libc::STDIN_FILENO, &raw mut termios) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(Attributes(termios))
    }

    fn set_attributes(&mut self, attrs: &Attributes) -> io::Result<()> {
        if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &raw const attrs.0) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn flags(&self) -> io::Result<DescriptorFlags> {
        let bits = unsafe { libc::fcntl(libc::STDIN_FILENO, libc::F_GETFL, 0) };
        if bits == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(DescriptorFlags(bits))
    }

    fn set_flags(&mut self, flags: DescriptorFlags) -> io::Result<()> {
        if unsafe { libc::fcntl(libc::STDIN_FILENO, libc::F_SETFL, flags.0) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<ByteRead> {
        let mut byte = 0u8;
        loop {
            let n = unsafe { libc::read(libc::STDIN_FILENO, (&raw mut byte).cast(), 1) };
            match n {
                1 => return Ok(ByteRead::Byte(byte)),
                0 => return Ok(ByteRead::Eof),
                _ => {
                    let err = io::Error::last_os_error();
                    match err.kind() {
                        io::ErrorKind::WouldBlock => return Ok(ByteRead::WouldBlock),
                        io::ErrorKind::Interrupted => {}
                        _ => return Err(err),
                    }
                }
            }
        }
    }

    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
        loop {
            let mut pfd = libc::pollfd {
                fd: libc::STDIN_FILENO,
                events: libc::POLLIN,
                revents: 0,
            };
            let ready = unsafe { libc::poll(&raw mut pfd, 1, millis) };
            if ready >= 0 {
                return Ok(ready > 0);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
