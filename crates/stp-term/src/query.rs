// SPDX-License-Identifier: MIT
//
// Cursor and geometry queries over DSR 6n.
//
// The terminal answers a position request on *stdin*, in the same stream as
// the user's keystrokes. A query therefore runs inside hidden raw mode (so
// the reply isn't echoed and arrives without waiting for Enter), reads the
// reply byte by byte, and sets aside anything that isn't the reply:
//
//   - bytes before the reply's ESC were typed ahead, and go to the pushback
//     queue in arrival order
//   - a complete CSI sequence that doesn't end in `R` (an arrow key, say)
//     goes to pushback too
//
// Screen size has no query of its own. We save the cursor, drop the scroll
// region, jump to (255, 255), and let the terminal clamp that to its last
// cell, then ask where the cursor ended up and move it back.

use std::io::Write;

use crate::ansi::{self, FAR_CORNER};
use crate::device::{ByteRead, Device};
use crate::error::{Error, ProtocolError, Result};
use crate::raw_mode::RawMode;
use crate::session::Session;

/// Longest reply we accept, `ESC [` through `R`.
pub const MAX_REPLY_LEN: usize = 32;

const ESC: u8 = 0x1b;

/// A 1-based screen position: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coordinate {
    /// Column, starting at 1. The screen width in max-position mode.
    pub x: u16,
    /// Row, starting at 1. The screen height in max-position mode.
    pub y: u16,
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Parse a complete `ESC [ row ; col R` report.
///
/// ```
/// use stp_term::query::{parse_position_report, Coordinate};
///
/// assert_eq!(
///     parse_position_report(b"\x1b[24;80R"),
///     Ok(Coordinate { x: 80, y: 24 })
/// );
/// ```
///
/// # Errors
///
/// A [`ProtocolError`] naming what is wrong, carrying the input bytes.
pub fn parse_position_report(reply: &[u8]) -> Result<Coordinate, ProtocolError> {
    let body = reply
        .strip_prefix(b"\x1b[")
        .ok_or_else(|| ProtocolError::MissingPrefix(reply.to_vec()))?;
    let body = match body.strip_suffix(b"R") {
        Some(body) => body,
        None if body.contains(&b'R') => return Err(ProtocolError::Malformed(reply.to_vec())),
        None => return Err(ProtocolError::Truncated(reply.to_vec())),
    };

    let mut fields = body.splitn(2, |&b| b == b';');
    let row = fields.next().unwrap_or_default();
    let col = fields
        .next()
        .ok_or_else(|| ProtocolError::Malformed(reply.to_vec()))?;

    Ok(Coordinate {
        x: parse_field(col, reply)?,
        y: parse_field(row, reply)?,
    })
}

/// One decimal field of a report.
fn parse_field(digits: &[u8], reply: &[u8]) -> Result<u16, ProtocolError> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(ProtocolError::Malformed(reply.to_vec()));
    }
    digits
        .iter()
        .try_fold(0u16, |acc, &d| {
            acc.checked_mul(10)?.checked_add(u16::from(d - b'0'))
        })
        .ok_or_else(|| ProtocolError::OutOfRange(reply.to_vec()))
}

// ─── Session: queries ────────────────────────────────────────────────────────

impl<D: Device> Session<D> {
    /// Ask the terminal where the cursor is.
    ///
    /// With `report_max`, ask where the cursor *would* be after moving to
    /// the far corner, i.e. the screen size. The real cursor is put back
    /// either way.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the reply is malformed or input ends first
    /// - [`Error::ReplyTimeout`] if a reply timeout is configured and expires
    /// - [`Error::Os`] if raw mode can't be entered or left
    pub fn query_position(&mut self, report_max: bool) -> Result<Coordinate> {
        self.device.flush()?;
        self.with_raw_mode(RawMode::Hidden, |s| {
            s.set_input_blocking(true)?;
            if report_max {
                ansi::save_cursor(&mut s.device)?;
                ansi::reset_scroll_region(&mut s.device)?;
                ansi::goto(&mut s.device, FAR_CORNER, FAR_CORNER)?;
            }
            ansi::request_position(&mut s.device)?;
            s.device.flush()?;

            let reply = s.read_reply();

            if report_max {
                let moved_back = ansi::restore_cursor(&mut s.device).and_then(|()| s.device.flush());
                match (&reply, moved_back) {
                    (Ok(_), Err(err)) => return Err(err.into()),
                    (Err(reply_err), Err(err)) => {
                        tracing::error!(%err, %reply_err, "can't move cursor back after failed query");
                    }
                    (_, Ok(())) => {}
                }
            }

            let reply = reply?;
            parse_position_report(&reply).map_err(|err| {
                tracing::warn!(%err, "unusable cursor position report");
                Error::from(err)
            })
        })
    }

    /// Current cursor column.
    ///
    /// # Errors
    ///
    /// Same as [`query_position`](Self::query_position).
    pub fn cursor_x(&mut self) -> Result<u16> {
        Ok(self.query_position(false)?.x)
    }

    /// Current cursor row.
    ///
    /// # Errors
    ///
    /// Same as [`query_position`](Self::query_position).
    pub fn cursor_y(&mut self) -> Result<u16> {
        Ok(self.query_position(false)?.y)
    }

    /// Current cursor column and row in one round trip.
    ///
    /// # Errors
    ///
    /// Same as [`query_position`](Self::query_position).
    pub fn cursor_position(&mut self) -> Result<Coordinate> {
        self.query_position(false)
    }

    /// Screen width in columns.
    ///
    /// # Errors
    ///
    /// Same as [`query_position`](Self::query_position).
    pub fn screen_width(&mut self) -> Result<u16> {
        Ok(self.query_position(true)?.x)
    }

    /// Screen height in rows.
    ///
    /// # Errors
    ///
    /// Same as [`query_position`](Self::query_position).
    pub fn screen_height(&mut self) -> Result<u16> {
        Ok(self.query_position(true)?.y)
    }

    /// Width and height in one round trip.
    ///
    /// # Errors
    ///
    /// Same as [`query_position`](Self::query_position).
    pub fn screen_size(&mut self) -> Result<Coordinate> {
        self.query_position(true)
    }

    /// Read one position report off the device, diverting keystrokes.
    ///
    /// Whatever isn't part of the reply ends up in the pushback queue, on
    /// success and on error alike.
    fn read_reply(&mut self) -> Result<Vec<u8>> {
        let mut skipped = Vec::new();
        let result = self.scan_reply(&mut skipped);
        self.pushback.extend(skipped);
        result
    }

    fn scan_reply(&mut self, skipped: &mut Vec<u8>) -> Result<Vec<u8>> {
        let mut reply: Vec<u8> = Vec::with_capacity(MAX_REPLY_LEN);
        loop {
            if let Some(timeout) = self.config.reply_timeout {
                if !self.device.wait_readable(timeout)? {
                    skipped.append(&mut reply);
                    return Err(Error::ReplyTimeout(timeout));
                }
            }
            let byte = match self.device.read_byte()? {
                ByteRead::Byte(byte) => byte,
                ByteRead::WouldBlock | ByteRead::Eof => {
                    return Err(ProtocolError::Truncated(reply).into());
                }
            };

            match (reply.len(), byte) {
                (0, ESC) => reply.push(byte),
                (0, _) => skipped.push(byte),
                (1, b'[') => reply.push(byte),
                // A lone ESC was the Escape key; this byte starts over.
                (1, _) => {
                    skipped.push(ESC);
                    reply.clear();
                    if byte == ESC {
                        reply.push(byte);
                    } else {
                        skipped.push(byte);
                    }
                }
                (_, b'R') => {
                    reply.push(byte);
                    return Ok(reply);
                }
                (_, 0x40..=0x7e) => {
                    reply.push(byte);
                    if !is_key_final(byte) {
                        return Err(ProtocolError::Malformed(reply).into());
                    }
                    tracing::trace!(sequence = ?reply, "keystroke sequence during position query");
                    skipped.append(&mut reply);
                }
                _ => {
                    reply.push(byte);
                    if reply.len() >= MAX_REPLY_LEN {
                        return Err(ProtocolError::Malformed(reply).into());
                    }
                }
            }

            // A terminal that never answers must not keep us reading input.
            if skipped.len() > MAX_REPLY_LEN {
                return Err(ProtocolError::MissingPrefix(skipped.clone()).into());
            }
        }
    }
}

/// Final bytes of the CSI sequences keyboards send: cursor and editing keys
/// (`A`–`D`, `E`, `F`, `H`), F1–F4 (`P`–`S`), back-tab (`Z`), the `~` family
/// and kitty's `u`. Anything else ending a sequence mid-query is a broken
/// reply, not a key.
const fn is_key_final(byte: u8) -> bool {
    matches!(byte, b'A'..=b'F' | b'H' | b'P'..=b'S' | b'Z' | b'~' | b'u')
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::color::Color;
    use crate::config::Config;
    use crate::testing::FakeTerminal;
    use pretty_assertions::assert_eq;

    fn open(term: FakeTerminal) -> Session<FakeTerminal> {
        Session::open(term, Config::default()).unwrap()
    }

    const fn at(x: u16, y: u16) -> Coordinate {
        Coordinate { x, y }
    }

    // ── Parser ──────────────────────────────────────────────────────

    #[test]
    fn parse_typical_report() {
        assert_eq!(parse_position_report(b"\x1b[24;80R"), Ok(at(80, 24)));
    }

    #[test]
    fn parse_origin() {
        assert_eq!(parse_position_report(b"\x1b[1;1R"), Ok(at(1, 1)));
    }

    #[test]
    fn parse_rejects_missing_prefix() {
        assert_eq!(
            parse_position_report(b"24;80R"),
            Err(ProtocolError::MissingPrefix(b"24;80R".to_vec()))
        );
        assert!(matches!(
            parse_position_report(b"\x1b24;80R"),
            Err(ProtocolError::MissingPrefix(_))
        ));
    }

    #[test]
    fn parse_rejects_missing_terminator() {
        assert!(matches!(
            parse_position_report(b"\x1b[24;80"),
            Err(ProtocolError::Truncated(_))
        ));
    }

    #[test]
    fn parse_rejects_trailing_bytes() {
        assert!(matches!(
            parse_position_report(b"\x1b[24;80Rx"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn parse_rejects_bad_bodies() {
        for bad in [
            &b"\x1b[;80R"[..],
            b"\x1b[24;R",
            b"\x1b[2480R",
            b"\x1b[24;8a0R",
            b"\x1b[24;80;1R",
            b"\x1b[-1;80R",
        ] {
            assert!(
                matches!(parse_position_report(bad), Err(ProtocolError::Malformed(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn parse_rejects_oversized_values() {
        assert!(matches!(
            parse_position_report(b"\x1b[70000;1R"),
            Err(ProtocolError::OutOfRange(_))
        ));
        assert_eq!(parse_position_report(b"\x1b[65535;1R"), Ok(at(1, 65535)));
    }

    // ── Cursor position ─────────────────────────────────────────────

    #[test]
    fn home_after_clear_is_origin() {
        let mut s = open(FakeTerminal::new(80, 24));
        s.text_background(Color::BLUE).unwrap();
        s.clear_screen().unwrap();
        s.goto(1, 1).unwrap();
        assert_eq!(s.cursor_position().unwrap(), at(1, 1));
    }

    #[test]
    fn cursor_follows_goto() {
        let mut s = open(FakeTerminal::new(80, 24));
        s.goto(17, 9).unwrap();
        assert_eq!(s.cursor_x().unwrap(), 17);
        assert_eq!(s.cursor_y().unwrap(), 9);
    }

    #[test]
    fn query_flushes_pending_output_first() {
        let mut s = open(FakeTerminal::new(80, 24));
        write!(s, "\x1b[5;6H").unwrap();
        assert_eq!(s.cursor_position().unwrap(), at(6, 5));
    }

    #[test]
    fn query_emits_only_the_request() {
        let mut s = open(FakeTerminal::new(80, 24));
        s.cursor_position().unwrap();
        assert_eq!(s.device().output(), "\x1b[6n");
    }

    // ── Screen size ─────────────────────────────────────────────────

    #[test]
    fn screen_size_from_clamped_corner() {
        let mut s = open(FakeTerminal::new(80, 24));
        assert_eq!(s.screen_size().unwrap(), at(80, 24));
        assert_eq!(s.screen_width().unwrap(), 80);
        assert_eq!(s.screen_height().unwrap(), 24);
    }

    #[test]
    fn screen_size_puts_cursor_back() {
        let mut s = open(FakeTerminal::new(132, 50));
        s.goto(10, 7).unwrap();
        s.device_mut().flush().unwrap();
        s.device_mut().clear_output();

        assert_eq!(s.screen_size().unwrap(), at(132, 50));
        assert_eq!(s.device().cursor(), (10, 7));
        assert_eq!(s.device().output(), "\x1b[s\x1b[r\x1b[255;255H\x1b[6n\x1b[u");
    }

    // ── Typed-ahead input ───────────────────────────────────────────

    #[test]
    fn keys_before_reply_are_kept() {
        let mut s = open(FakeTerminal::new(80, 24).with_input(b"ab"));
        assert_eq!(s.screen_size().unwrap(), at(80, 24));
        assert_eq!(s.pending_keys(), 2);
        assert_eq!(s.read_key_hidden().unwrap(), b'a');
        assert_eq!(s.read_key_hidden().unwrap(), b'b');
    }

    #[test]
    fn escape_key_before_reply_is_kept() {
        let mut s = open(FakeTerminal::new(80, 24).with_input(b"\x1bq"));
        assert_eq!(s.cursor_position().unwrap(), at(1, 1));
        assert_eq!(s.pushback.iter().copied().collect::<Vec<_>>(), b"\x1bq");
    }

    #[test]
    fn arrow_key_before_reply_is_kept() {
        let mut s = open(FakeTerminal::new(80, 24).with_input(b"\x1b[A"));
        assert_eq!(s.cursor_position().unwrap(), at(1, 1));
        assert_eq!(s.pushback.iter().copied().collect::<Vec<_>>(), b"\x1b[A");
    }

    // ── Failures ────────────────────────────────────────────────────

    #[test]
    fn malformed_reply_is_protocol_error() {
        // A real terminal never reports EOF; the reader must stop on its own.
        let mut s = open(FakeTerminal::new(80, 24).with_reply(b"\x1b[12x4R").never_eof());
        let err = s.cursor_position().unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::Malformed(ref bytes)) if bytes == b"\x1b[12x"
        ));
        assert_eq!(s.pending_keys(), 0, "broken reply isn't mistaken for keys");
    }

    #[test]
    fn endless_keystrokes_without_reply_give_up() {
        let typed = [b'a'; 64];
        let mut s = open(FakeTerminal::new(80, 24).with_input(&typed).silent().never_eof());
        let err = s.cursor_position().unwrap_err();
        match err {
            Error::Protocol(ProtocolError::MissingPrefix(bytes)) => {
                assert_eq!(bytes.len(), MAX_REPLY_LEN + 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(s.pending_keys(), MAX_REPLY_LEN + 1, "typed keys stay readable");
    }

    #[test]
    fn modified_and_tilde_keys_before_reply_are_kept() {
        let mut s = open(FakeTerminal::new(80, 24).with_input(b"\x1b[1;5A\x1b[3~").never_eof());
        assert_eq!(s.cursor_position().unwrap(), at(1, 1));
        assert_eq!(
            s.pushback.iter().copied().collect::<Vec<_>>(),
            b"\x1b[1;5A\x1b[3~"
        );
    }

    #[test]
    fn endless_reply_is_capped() {
        let reply = [b"\x1b[".as_slice(), &[b'1'; 64]].concat();
        let mut s = open(FakeTerminal::new(80, 24).with_reply(&reply));
        let err = s.cursor_position().unwrap_err();
        match err {
            Error::Protocol(ProtocolError::Malformed(bytes)) => assert_eq!(bytes.len(), MAX_REPLY_LEN),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_reply_is_truncated() {
        let mut s = open(FakeTerminal::new(80, 24).with_reply(b"\x1b[3;"));
        let err = s.cursor_position().unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::Truncated(ref bytes)) if bytes == b"\x1b[3;"
        ));
    }

    #[test]
    fn silent_terminal_times_out() {
        let config = Config::default().with_reply_timeout(Some(Duration::from_millis(10)));
        let mut s = Session::open(FakeTerminal::new(80, 24).silent(), config).unwrap();
        let err = s.cursor_position().unwrap_err();
        assert!(matches!(err, Error::ReplyTimeout(d) if d == Duration::from_millis(10)));
    }

    #[test]
    fn mode_restored_after_failed_query() {
        let mut s = open(FakeTerminal::new(80, 24).with_reply(b"garbage"));
        let attrs = s.device().current_attributes();
        let flags = s.device().current_flags();
        s.goto(4, 4).unwrap();
        assert!(s.screen_size().is_err());
        assert_eq!(s.device().current_attributes(), attrs);
        assert_eq!(s.device().current_flags(), flags);
        assert_eq!(s.device().cursor(), (4, 4), "cursor moved back despite error");
    }

    #[test]
    fn query_runs_without_echo() {
        let mut s = open(FakeTerminal::new(80, 24));
        s.cursor_position().unwrap();
        let logged = &s.device().attribute_log;
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0].local_flags() & libc::ECHO, 0);
        assert_ne!(logged[1].local_flags() & libc::ECHO, 0);
    }
}
