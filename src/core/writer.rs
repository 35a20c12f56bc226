//! Serialized terminal output
//!
//! All escape-sequence emission goes through one [`AnsiWriter`], whose mutex
//! is the process-wide output lock. Multi-part emissions (such as a color
//! reset followed by both channel colors) hold an [`OutputGuard`] so no other
//! emission can land in between.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::io::TerminalIo;

pub struct AnsiWriter {
    io: Arc<dyn TerminalIo>,
    lock: Mutex<()>,
    /// False when output is redirected; escape sequences are then dropped
    escapes_enabled: bool,
}

/// Exclusive access to the output channel
pub struct OutputGuard<'a> {
    writer: &'a AnsiWriter,
    _lock: MutexGuard<'a, ()>,
}

impl AnsiWriter {
    pub fn new(io: Arc<dyn TerminalIo>) -> Self {
        let escapes_enabled = io.is_output_terminal();
        Self {
            io,
            lock: Mutex::new(()),
            escapes_enabled,
        }
    }

    /// Whether escape sequences reach the terminal
    pub fn escapes_enabled(&self) -> bool {
        self.escapes_enabled
    }

    /// Take the output lock
    pub fn lock(&self) -> OutputGuard<'_> {
        OutputGuard {
            writer: self,
            _lock: self.lock.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Emit one escape sequence under the output lock
    pub fn write_escape(&self, sequence: &str) -> io::Result<()> {
        if !self.escapes_enabled || sequence.is_empty() {
            return Ok(());
        }
        self.lock().escape(sequence)
    }

    /// Write plain text under the output lock
    pub fn write_text(&self, text: &str) -> io::Result<()> {
        self.lock().text(text.as_bytes())
    }

    /// Write a single character without allocating
    pub fn write_char(&self, ch: char) -> io::Result<()> {
        let mut buf = [0u8; 4];
        self.lock().text(ch.encode_utf8(&mut buf).as_bytes())
    }

    fn write_all(&self, mut bytes: &[u8]) -> io::Result<()> {
        while !bytes.is_empty() {
            match self.io.write(bytes) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => bytes = &bytes[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => self.io.wait_writable()?,
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    // Reader went away; nothing left to deliver to
                    debug!("Terminal output closed, dropping {} bytes", bytes.len());
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl OutputGuard<'_> {
    /// Emit an escape sequence; dropped when output is redirected
    pub fn escape(&self, sequence: &str) -> io::Result<()> {
        if !self.writer.escapes_enabled || sequence.is_empty() {
            return Ok(());
        }
        self.writer.write_all(sequence.as_bytes())
    }

    /// Write bytes regardless of redirection
    pub fn text(&self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)
    }
}
