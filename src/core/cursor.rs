//! Cursor position query
//!
//! Sends the cursor position request (`ESC [ 6 n`) and parses the terminal's
//! report (`ESC [ <row> ; <col> R`) from the input stream. The exchange runs
//! under the input lock so concurrent key reads cannot take response bytes.
//! Bytes that arrive ahead of or inside the report, such as keys typed while
//! the query is in flight, are discarded; bytes already read past the final
//! `R` go back to the key buffer. A terminal that never answers blocks the
//! caller; there is no timeout.

use std::io;

use tracing::debug;

use super::caps::CapabilitySet;
use super::input::InputReader;
use super::io::{RawModeGuard, TerminalIo};
use super::writer::AnsiWriter;
use crate::error::Result;

const ESC: u8 = 0x1b;
const SCRATCH_SIZE: usize = 64;

/// Query the zero-based `(row, column)` of the cursor.
///
/// Returns `(0, 0)` without any I/O when either side is redirected or the
/// terminal has no usable request capability.
pub fn query_position(
    io: &dyn TerminalIo,
    caps: &CapabilitySet,
    writer: &AnsiWriter,
    input: &InputReader,
) -> Result<(u16, u16)> {
    let Some(request) = caps.cursor_position_request.as_deref() else {
        debug!("Cursor position query skipped: no request capability");
        return Ok((0, 0));
    };
    if !io.is_input_terminal() || !io.is_output_terminal() {
        debug!("Cursor position query skipped: I/O is redirected");
        return Ok((0, 0));
    }

    let mut pending = input.lock();
    let _raw = RawModeGuard::enable(io)?;
    writer.write_escape(request)?;

    let mut scanner = ResponseScanner::new(io);
    let position = scanner.parse_report()?;
    pending.extend_from_slice(scanner.unread());

    match position {
        Some((row, col)) => {
            debug!("Cursor position report: row {}, col {}", row, col);
            Ok((to_zero_based(row), to_zero_based(col)))
        }
        None => {
            debug!("Input ended before a complete cursor position report");
            Ok((0, 0))
        }
    }
}

fn to_zero_based(value: u32) -> u16 {
    u16::try_from(value.saturating_sub(1)).unwrap_or(u16::MAX)
}

/// Byte scanner over unbuffered terminal reads
struct ResponseScanner<'a> {
    io: &'a dyn TerminalIo,
    buf: [u8; SCRATCH_SIZE],
    pos: usize,
    len: usize,
}

impl<'a> ResponseScanner<'a> {
    fn new(io: &'a dyn TerminalIo) -> Self {
        Self {
            io,
            buf: [0; SCRATCH_SIZE],
            pos: 0,
            len: 0,
        }
    }

    /// `ESC [ row ; col R`, or `None` if input ends first
    fn parse_report(&mut self) -> io::Result<Option<(u32, u32)>> {
        if !self.skip_past(ESC)? || !self.skip_past(b'[')? {
            return Ok(None);
        }
        let Some(row) = self.read_number()? else {
            return Ok(None);
        };
        let Some(col) = self.read_number()? else {
            return Ok(None);
        };
        if !self.skip_past(b'R')? {
            return Ok(None);
        }
        Ok(Some((row, col)))
    }

    /// Next byte without consuming it, refilling the scratch buffer when empty
    fn peek(&mut self) -> io::Result<Option<u8>> {
        while self.pos == self.len {
            match self.io.read(&mut self.buf) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    self.pos = 0;
                    self.len = n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Some(self.buf[self.pos]))
    }

    /// Discard bytes up to and including `target`
    fn skip_past(&mut self, target: u8) -> io::Result<bool> {
        while let Some(b) = self.peek()? {
            self.pos += 1;
            if b == target {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Skip to the next digit and parse the run of digits starting there
    fn read_number(&mut self) -> io::Result<Option<u32>> {
        loop {
            match self.peek()? {
                None => return Ok(None),
                Some(b) if b.is_ascii_digit() => break,
                Some(_) => self.pos += 1,
            }
        }

        let mut value: u32 = 0;
        while let Some(b) = self.peek()? {
            if !b.is_ascii_digit() {
                break;
            }
            value = value.saturating_mul(10).saturating_add(u32::from(b - b'0'));
            self.pos += 1;
        }
        Ok(Some(value))
    }

    /// Bytes read past the end of the report
    fn unread(&self) -> &[u8] {
        &self.buf[self.pos..self.len]
    }
}
