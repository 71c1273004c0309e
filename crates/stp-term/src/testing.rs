// SPDX-License-Identifier: MIT
//
// In-memory terminal for tests.
//
// `FakeTerminal` implements `Device` well enough to exercise the session
// end to end without a TTY: it keeps a termios value and a flag word,
// queues scripted input, and interprets the CSI sequences this crate emits
// (CUP, save/restore cursor, DSR 6n) against a clamped cursor on a fixed
// size screen. Output is only "seen" by the terminal when flushed, like a
// real stdout buffer.
//
// Blocking reads on an empty queue return EOF; a test can't wait for a
// keypress that will never come.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::time::Duration;

use crate::device::{Attributes, ByteRead, DescriptorFlags, Device};

#[derive(Debug)]
pub struct FakeTerminal {
    attributes: Attributes,
    flags: DescriptorFlags,
    input: VecDeque<u8>,
    unflushed: Vec<u8>,
    output: Vec<u8>,
    width: u16,
    height: u16,
    col: u16,
    row: u16,
    saved: Option<(u16, u16)>,
    reply: Reply,
    fail_get_attributes: bool,
    fail_set_attributes: bool,
    hang_on_empty: bool,
    /// Every attribute set applied, in order.
    pub attribute_log: Vec<Attributes>,
    /// Every flag word applied, in order.
    pub flag_log: Vec<DescriptorFlags>,
}

#[derive(Debug, Clone)]
enum Reply {
    Report,
    Custom(Vec<u8>),
    Silent,
}

impl FakeTerminal {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            attributes: Attributes::cooked(),
            flags: DescriptorFlags::from_bits(libc::O_RDWR),
            input: VecDeque::new(),
            unflushed: Vec::new(),
            output: Vec::new(),
            width,
            height,
            col: 1,
            row: 1,
            saved: None,
            reply: Reply::Report,
            fail_get_attributes: false,
            fail_set_attributes: false,
            hang_on_empty: false,
            attribute_log: Vec::new(),
            flag_log: Vec::new(),
        }
    }

    /// Queue bytes as if the user typed them.
    pub fn with_input(mut self, bytes: &[u8]) -> Self {
        self.type_keys(bytes);
        self
    }

    /// Answer DSR 6n with these bytes instead of a real report.
    pub fn with_reply(mut self, bytes: &[u8]) -> Self {
        self.reply = Reply::Custom(bytes.to_vec());
        self
    }

    /// Never answer DSR 6n.
    pub fn silent(mut self) -> Self {
        self.reply = Reply::Silent;
        self
    }

    pub fn failing_attributes(mut self) -> Self {
        self.fail_get_attributes = true;
        self
    }

    pub fn failing_set_attributes(mut self) -> Self {
        self.fail_set_attributes = true;
        self
    }

    /// Behave like a real TTY: a blocking read on empty input never
    /// returns. Here it panics instead, so a test that gets there fails.
    pub fn never_eof(mut self) -> Self {
        self.hang_on_empty = true;
        self
    }

    /// Start refusing attribute changes from now on.
    pub fn break_set_attributes(&mut self) {
        self.fail_set_attributes = true;
    }

    pub fn type_keys(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    pub fn current_attributes(&self) -> Attributes {
        self.attributes
    }

    pub fn current_flags(&self) -> DescriptorFlags {
        self.flags
    }

    pub fn cursor(&self) -> (u16, u16) {
        (self.col, self.row)
    }

    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Everything flushed so far, lossily decoded.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn clear_output(&mut self) {
        self.output.clear();
    }

    fn echo(&mut self, byte: u8) {
        if self.attributes.local_flags() & libc::ECHO != 0 {
            self.output.push(byte);
        }
    }

    fn interpret(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == 0x1b && bytes.get(i + 1) == Some(&b'[') {
                let start = i + 2;
                let mut end = start;
                while end < bytes.len() && !(0x40..=0x7e).contains(&bytes[end]) {
                    end += 1;
                }
                if end == bytes.len() {
                    return;
                }
                self.csi(&bytes[start..end], bytes[end]);
                i = end + 1;
            } else {
                if bytes[i] >= 0x20 && self.col < self.width {
                    self.col += 1;
                }
                i += 1;
            }
        }
    }

    fn csi(&mut self, params: &[u8], final_byte: u8) {
        let text = String::from_utf8_lossy(params);
        let nums: Vec<u16> = text
            .split(';')
            .map(|p| p.parse::<u16>().unwrap_or(1).max(1))
            .collect();
        match (final_byte, params) {
            (b'H', _) => {
                let row = nums.first().copied().unwrap_or(1);
                let col = nums.get(1).copied().unwrap_or(1);
                self.row = row.min(self.height);
                self.col = col.min(self.width);
            }
            (b'n', b"6") => match self.reply.clone() {
                Reply::Report => {
                    let report = format!("\x1b[{};{}R", self.row, self.col);
                    self.input.extend(report.bytes());
                }
                Reply::Custom(bytes) => self.input.extend(bytes),
                Reply::Silent => {}
            },
            (b's', _) => self.saved = Some((self.col, self.row)),
            (b'u', _) => {
                if let Some((col, row)) = self.saved {
                    self.col = col;
                    self.row = row;
                }
            }
            _ => {}
        }
    }
}

impl Write for FakeTerminal {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.unflushed.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let bytes = std::mem::take(&mut self.unflushed);
        self.interpret(&bytes);
        self.output.extend_from_slice(&bytes);
        Ok(())
    }
}

impl Device for FakeTerminal {
    fn attributes(&self) -> io::Result<Attributes> {
        if self.fail_get_attributes {
            return Err(io::Error::from_raw_os_error(libc::ENOTTY));
        }
        Ok(self.attributes)
    }

    fn set_attributes(&mut self, attrs: &Attributes) -> io::Result<()> {
        if self.fail_set_attributes {
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }
        self.attributes = *attrs;
        self.attribute_log.push(*attrs);
        Ok(())
    }

    fn flags(&self) -> io::Result<DescriptorFlags> {
        Ok(self.flags)
    }

    fn set_flags(&mut self, flags: DescriptorFlags) -> io::Result<()> {
        self.flags = flags;
        self.flag_log.push(flags);
        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<ByteRead> {
        match self.input.pop_front() {
            Some(byte) => {
                self.echo(byte);
                Ok(ByteRead::Byte(byte))
            }
            None if self.flags.is_nonblocking() => Ok(ByteRead::WouldBlock),
            None if self.hang_on_empty => panic!("blocking read on empty input would never return"),
            None => Ok(ByteRead::Eof),
        }
    }

    fn wait_readable(&mut self, _timeout: Duration) -> io::Result<bool> {
        Ok(!self.input.is_empty())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unflushed_output_is_not_interpreted() {
        let mut t = FakeTerminal::new(80, 24);
        t.write_all(b"\x1b[5;7H").unwrap();
        assert_eq!(t.cursor(), (1, 1));
        t.flush().unwrap();
        assert_eq!(t.cursor(), (7, 5));
    }

    #[test]
    fn cursor_is_clamped() {
        let mut t = FakeTerminal::new(80, 24);
        t.write_all(b"\x1b[255;255H").unwrap();
        t.flush().unwrap();
        assert_eq!(t.cursor(), (80, 24));
    }

    #[test]
    fn dsr_queues_report() {
        let mut t = FakeTerminal::new(80, 24);
        t.write_all(b"\x1b[3;4H\x1b[6n").unwrap();
        t.flush().unwrap();
        let mut reply = Vec::new();
        while let Ok(ByteRead::Byte(b)) = t.read_byte() {
            reply.push(b);
        }
        assert_eq!(reply, b"\x1b[3;4R");
    }

    #[test]
    #[should_panic(expected = "would never return")]
    fn never_eof_refuses_to_hang() {
        let mut t = FakeTerminal::new(80, 24).never_eof();
        let _ = t.read_byte();
    }

    #[test]
    fn empty_blocking_read_is_eof() {
        let mut t = FakeTerminal::new(80, 24);
        assert_eq!(t.read_byte().unwrap(), ByteRead::Eof);
    }
}
