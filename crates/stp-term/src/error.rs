// SPDX-License-Identifier: MIT
//
// Error types and the fatal reporter.
//
// Two classes of failure live here. Terminal-mode failures (tcgetattr,
// tcsetattr, fcntl, sigaction) are fatal: once the line discipline might be
// half-configured, continuing risks leaving the user's shell unusable, so
// the session reports and exits. Everything else (a garbled cursor report,
// a closed stdin, a write error) is handed back to the caller.

use std::io;
use std::process;
use std::time::Duration;

use thiserror::Error;

/// Exit code used by [`fatal`].
pub const EXIT_CODE: i32 = 1;

/// Result alias for session operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything a session operation can fail with.
#[derive(Debug, Error)]
pub enum Error {
    /// The OS refused to read or change terminal configuration.
    ///
    /// Always fatal. See [`Error::is_fatal`].
    #[error("{context}")]
    Os {
        /// What we were trying to do, e.g. "can't set terminal attributes".
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// Writing output or reading input failed.
    #[error("terminal i/o failed: {0}")]
    Io(#[from] io::Error),

    /// The terminal answered a position query with something unparseable.
    #[error("bad cursor position report: {0}")]
    Protocol(#[from] ProtocolError),

    /// No position report arrived within the configured timeout.
    #[error("no cursor position report within {0:?}")]
    ReplyTimeout(Duration),

    /// Standard input was closed.
    #[error("end of input")]
    EndOfInput,

    /// Another session already owns the controlling terminal.
    #[error("a terminal session is already active in this process")]
    AlreadyInitialized,
}

impl Error {
    /// Wrap an OS error with a short description of the failed step.
    #[must_use]
    pub const fn os(context: &'static str, source: io::Error) -> Self {
        Self::Os { context, source }
    }

    /// Whether this error means the terminal may be left inconsistent.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Os { .. })
    }
}

/// A position report that doesn't match `ESC [ row ; col R`.
///
/// Carries the raw bytes received so callers (and logs) can see what the
/// terminal actually sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The reply doesn't start with `ESC [`.
    #[error("missing CSI prefix in {0:?}")]
    MissingPrefix(Vec<u8>),
    /// The reply ended before the final `R`.
    #[error("truncated reply {0:?}")]
    Truncated(Vec<u8>),
    /// The reply body isn't `digits ; digits`.
    #[error("malformed reply {0:?}")]
    Malformed(Vec<u8>),
    /// A coordinate doesn't fit in 16 bits.
    #[error("coordinate out of range in {0:?}")]
    OutOfRange(Vec<u8>),
}

/// Print an error to stderr and terminate the process with [`EXIT_CODE`].
///
/// The message format follows the classic `perror` layout: the error text,
/// then the OS errno and its description when there is one.
pub fn fatal(err: &Error) -> ! {
    eprintln!("{}", describe(err));
    process::exit(EXIT_CODE);
}

/// The line [`fatal`] prints.
fn describe(err: &Error) -> String {
    match err {
        Error::Os { context, source } => match source.raw_os_error() {
            Some(errno) => {
                // io::Error appends " (os error N)"; errno is already printed.
                let text = source.to_string();
                let suffix = format!(" (os error {errno})");
                let desc = text.strip_suffix(suffix.as_str()).unwrap_or(&text);
                format!("ERROR: {context} errno={errno} ({desc})")
            }
            None => format!("ERROR: {context} ({source})"),
        },
        other => format!("ERROR: {other}"),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
