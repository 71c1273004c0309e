// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no flushing: callers decide when bytes reach the terminal. The session's
// query protocol relies on that to batch a request with its setup moves.
//
// Coordinates here are 1-based, column first, exactly as conio's `gotoxy`
// took them. The terminal's CUP sequence wants row first.

use std::io::{self, Write};

use crate::color::Color;

/// Row/column larger than any real terminal. The terminal clamps a move
/// there to its bottom-right cell.
pub const FAR_CORNER: u16 = 255;

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to column `x`, row `y` (CUP).
#[inline]
pub fn goto(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{y};{x}H")
}

/// Save the cursor position (SCOSC).
#[inline]
pub fn save_cursor(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[s")
}

/// Restore the saved cursor position (SCORC).
#[inline]
pub fn restore_cursor(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[u")
}

/// Reset the scroll region to the full screen (DECSTBM with no params).
#[inline]
pub fn reset_scroll_region(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[r")
}

/// Ask for a cursor position report (DSR 6). The terminal answers on stdin.
#[inline]
pub fn request_position(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[6n")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen and home the cursor.
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J\x1b[1;1H")
}

/// Reset all SGR attributes to terminal defaults (SGR 0).
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

// ─── Color ───────────────────────────────────────────────────────────────────

/// Set the foreground color and its attribute in one SGR sequence.
pub fn text_color(w: &mut impl Write, color: Color) -> io::Result<()> {
    write!(w, "\x1b[{};{}m", color.attribute(), color.ansi_code())
}

/// Set the background color. Writes nothing for bright or styled colors.
pub fn text_background(w: &mut impl Write, color: Color) -> io::Result<()> {
    match color.background_code() {
        Some(code) => write!(w, "\x1b[{code}m"),
        None => Ok(()),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
