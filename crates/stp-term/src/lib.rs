// SPDX-License-Identifier: MIT
//
// stp-term — terminal control primitives for stp.
//
// A conio.h replacement for ANSI/VT100 terminals: colors, cursor placement,
// cursor and screen-size queries, and keyboard input without waiting for
// Enter. Everything goes through a single owned `Session`, which snapshots
// the terminal's line discipline on creation and puts it back on drop.
//
// The hard part is not the escape codes, it's the terminal state. Raw mode
// is a process-wide OS resource, the cursor position report arrives on the
// same input stream as the user's keystrokes, and toggling non-blocking
// mode on a TTY can raise SIGIO. Each of those has its own module.
//
// Unix only: the whole crate is built on termios, fcntl and sigaction.
#![cfg(unix)]

pub mod ansi;
pub mod color;
pub mod config;
pub mod device;
pub mod error;
pub mod keys;
pub mod query;
pub mod raw_mode;
pub mod session;
pub mod signal;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use color::{Color, Style};
pub use config::Config;
pub use device::{Device, Tty};
pub use error::{Error, ProtocolError, Result};
pub use keys::Poller;
pub use query::Coordinate;
pub use raw_mode::{RawMode, RawModeGuard};
pub use session::Session;
