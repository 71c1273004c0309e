// SPDX-License-Identifier: MIT
//
// Session configuration.
//
// Three knobs, all with defaults matching classic conio behavior: how long
// a key check sleeps before reading, whether a cursor report read may time
// out, and whether fatal terminal errors exit the process. `from_env` lets
// a driver program tune them without recompiling.

use std::env;
use std::time::Duration;

/// Default delay before each non-blocking key check.
///
/// Keeps a `while !key_available()` loop from spinning a core.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Env var: poll interval in microseconds.
pub const ENV_POLL_INTERVAL_US: &str = "STP_POLL_INTERVAL_US";
/// Env var: cursor report timeout in milliseconds (`0` = block forever).
pub const ENV_REPLY_TIMEOUT_MS: &str = "STP_REPLY_TIMEOUT_MS";
/// Env var: `0`/`false` to return fatal errors instead of exiting.
pub const ENV_EXIT_ON_FATAL: &str = "STP_EXIT_ON_FATAL";

/// Session settings.
///
/// ```
/// use std::time::Duration;
/// use stp_term::Config;
///
/// let config = Config::default()
///     .with_poll_interval(Duration::from_millis(20))
///     .with_reply_timeout(Some(Duration::from_secs(1)));
/// assert_eq!(config.poll_interval, Duration::from_millis(20));
/// assert!(config.exit_on_fatal);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Sleep before each non-blocking check. Zero disables the sleep.
    pub poll_interval: Duration,
    /// Upper bound on each wait for a cursor report byte. `None` blocks.
    pub reply_timeout: Option<Duration>,
    /// Exit the process on fatal terminal errors instead of returning them.
    pub exit_on_fatal: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            reply_timeout: None,
            exit_on_fatal: true,
        }
    }
}

impl Config {
    /// Set the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the cursor report timeout.
    #[must_use]
    pub const fn with_reply_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Choose between exiting and returning on fatal errors.
    #[must_use]
    pub const fn with_exit_on_fatal(mut self, exit: bool) -> Self {
        self.exit_on_fatal = exit;
        self
    }

    /// Defaults overridden by `STP_*` environment variables.
    ///
    /// Unparseable values are ignored (with a warning) rather than rejected.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_POLL_INTERVAL_US) {
            match raw.trim().parse::<u64>() {
                Ok(us) => config.poll_interval = Duration::from_micros(us),
                Err(_) => tracing::warn!(var = ENV_POLL_INTERVAL_US, value = %raw, "ignoring invalid value"),
            }
        }

        if let Some(raw) = lookup(ENV_REPLY_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(0) => config.reply_timeout = None,
                Ok(ms) => config.reply_timeout = Some(Duration::from_millis(ms)),
                Err(_) => tracing::warn!(var = ENV_REPLY_TIMEOUT_MS, value = %raw, "ignoring invalid value"),
            }
        }

        if let Some(raw) = lookup(ENV_EXIT_ON_FATAL) {
            match parse_bool(&raw) {
                Some(flag) => config.exit_on_fatal = flag,
                None => tracing::warn!(var = ENV_EXIT_ON_FATAL, value = %raw, "ignoring invalid value"),
            }
        }

        config
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
