// SPDX-License-Identifier: MIT
//
// stp — clock demo for stp-term.
//
// Paints a green screen with blue top and bottom rows, then keeps a yellow
// clock ticking in the top-left corner until a key is pressed:
//
//   ┌──────────────────────────────┐
//   │18/10/2026 14:03:27           │  ← row 1, blue, redrawn every tick
//   │                              │
//   │         (green)              │
//   │                              │
//   │                              │  ← last row, blue
//   └──────────────────────────────┘
//
// The loop holds one `Poller` for its whole life, so stdin stays in hidden
// non-blocking mode between frames instead of being switched per check.
//
// Logging is off unless STP_LOG is set (e.g. `STP_LOG=stp_term=debug`).
// It goes to stderr, so redirect it: `STP_LOG=debug stp 2>stp.log`.

#[cfg(unix)]
use std::io::Write;
use std::process;
#[cfg(unix)]
use std::thread;

#[cfg(unix)]
use chrono::{DateTime, Local, TimeZone};
#[cfg(unix)]
use stp_term::{Color, Config, Session};
#[cfg(unix)]
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
#[cfg(unix)]
const LOG_ENV: &str = "STP_LOG";

/// strftime pattern for the clock.
#[cfg(unix)]
const CLOCK_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[cfg(unix)]
fn main() {
    init_tracing();

    let mut term = Session::init_with(Config::from_env()).unwrap_or_else(|e| {
        eprintln!("stp: failed to initialize terminal: {e}");
        process::exit(1);
    });

    if let Err(e) = run(&mut term) {
        // Exit skips destructors; put the terminal back first.
        drop(term);
        eprintln!("stp: {e}");
        process::exit(1);
    }
}

#[cfg(not(unix))]
fn main() {
    eprintln!("stp: needs a Unix terminal");
    process::exit(1);
}

#[cfg(unix)]
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(unix)]
fn run(term: &mut Session) -> stp_term::Result<()> {
    let size = term.screen_size()?;
    tracing::info!(width = size.x, height = size.y, "screen size");

    term.text_background(Color::GREEN)?;
    term.clear_screen()?;

    let band = " ".repeat(usize::from(size.x));
    term.text_background(Color::BLUE)?;
    term.write_all(band.as_bytes())?;
    term.goto(1, size.y)?;
    term.write_all(band.as_bytes())?;
    term.goto(2, 2)?;

    let mut poller = term.begin_poll()?;
    let key = loop {
        draw_clock(&mut poller, &Local::now())?;
        if let Some(key) = poller.poll_once()? {
            break key;
        }
        thread::sleep(poller.poll_interval());
    };
    poller.finish()?;

    writeln!(term, "You have pressed: {key}")?;
    term.flush()?;
    term.defaults()
}

/// Draw the time at (1,1) in yellow.
#[cfg(unix)]
fn draw_clock<Tz: TimeZone>(term: &mut Session, now: &DateTime<Tz>) -> stp_term::Result<()>
where
    Tz::Offset: std::fmt::Display,
{
    term.text_color(Color::YELLOW)?;
    term.goto(1, 1)?;
    write!(term, "{}    ", clock_text(now))?;
    term.flush()?;
    Ok(())
}

#[cfg(unix)]
fn clock_text<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format(CLOCK_FORMAT).to_string()
}

// ─── Tests ──────────────────────────────────────────────────────────────────
