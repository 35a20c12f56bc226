//! Keyboard input
//!
//! Bytes read from the terminal accumulate in a pending buffer guarded by the
//! input lock. Interactive reads and cursor position queries both hold that
//! lock, so neither can consume bytes meant for the other.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::caps::CapabilitySet;
use super::io::{RawModeGuard, TerminalIo};
use super::keys::{decode_char, ConsoleKey, KeyInfo};
use super::writer::AnsiWriter;
use crate::error::Result;

const READ_CHUNK: usize = 256;

pub struct InputReader {
    io: Arc<dyn TerminalIo>,
    pending: Mutex<Vec<u8>>,
}

impl InputReader {
    pub fn new(io: Arc<dyn TerminalIo>) -> Self {
        Self {
            io,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Take the input lock
    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read one key, blocking until it arrives.
    ///
    /// With `intercept` false the key's character is echoed to the output.
    pub fn read_key(
        &self,
        intercept: bool,
        caps: &CapabilitySet,
        writer: &AnsiWriter,
    ) -> Result<KeyInfo> {
        let mut pending = self.lock();
        let interactive = self.io.is_input_terminal();
        let raw = if interactive {
            Some(RawModeGuard::enable(self.io.as_ref())?)
        } else {
            None
        };

        let key = loop {
            if pending.is_empty() && self.fill(&mut pending)? == 0 {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }

            if interactive {
                let table = &caps.key_table;
                if table.is_partial(&pending) && self.io.input_ready()? && self.fill(&mut pending)? > 0 {
                    continue;
                }
                if let Some((info, len)) = table.match_key(&pending) {
                    pending.drain(..len);
                    break info;
                }
            }

            match decode_char(&pending) {
                Some((ch, len)) => {
                    pending.drain(..len);
                    break KeyInfo::from_char(ch);
                }
                None => {
                    if self.fill(&mut pending)? == 0 {
                        // Input ended inside a multi-byte character
                        pending.clear();
                        break KeyInfo::from_char(char::REPLACEMENT_CHARACTER);
                    }
                }
            }
        };
        drop(raw);
        drop(pending);

        if !intercept {
            echo(writer, &key)?;
        }
        Ok(key)
    }

    /// Whether a key can be read without blocking
    pub fn key_available(&self) -> Result<bool> {
        let pending = self.lock();
        if !pending.is_empty() {
            return Ok(true);
        }
        Ok(self.io.input_ready()?)
    }

    /// Append one chunk of input to `pending`, returning the byte count
    pub(crate) fn fill(&self, pending: &mut Vec<u8>) -> io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.io.read(&mut chunk) {
                Ok(n) => {
                    pending.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

fn echo(writer: &AnsiWriter, key: &KeyInfo) -> io::Result<()> {
    match key.key {
        ConsoleKey::Enter => writer.write_text("\r\n"),
        ConsoleKey::Tab => writer.write_char('\t'),
        _ if !key.key_char.is_control() => writer.write_char(key.key_char),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::mock::MockTerminal;
    use crate::core::keys::Modifiers;
    use crate::error::ConsoleError;
    use crate::terminfo::TermDescription;

    fn setup(input_tty: bool) -> (Arc<MockTerminal>, InputReader, AnsiWriter, CapabilitySet) {
        let mock = Arc::new(MockTerminal::with_tty(input_tty, true));
        let reader = InputReader::new(mock.clone());
        let writer = AnsiWriter::new(mock.clone());
        let caps = CapabilitySet::from_database(&TermDescription::builtin("xterm").unwrap());
        (mock, reader, writer, caps)
    }

    #[test]
    fn test_reads_keys_and_characters() {
        let (mock, reader, writer, caps) = setup(true);
        mock.push_input(b"\x1b[1;5Ax\x1bOP");

        let key = reader.read_key(true, &caps, &writer).unwrap();
        assert_eq!((key.key, key.modifiers), (ConsoleKey::UpArrow, Modifiers::CTRL));
        let key = reader.read_key(true, &caps, &writer).unwrap();
        assert_eq!(key.key, ConsoleKey::Char('x'));
        let key = reader.read_key(true, &caps, &writer).unwrap();
        assert_eq!(key.key, ConsoleKey::F(1));

        assert!(mock.output().is_empty());
        assert_eq!(mock.raw_entries(), 3);
        assert!(!mock.is_raw());
    }

    #[test]
    fn test_split_sequence_is_joined() {
        let (mock, reader, writer, caps) = setup(true);
        mock.push_input(b"\x1b[1;");
        mock.push_input(b"5D");
        let key = reader.read_key(true, &caps, &writer).unwrap();
        assert_eq!((key.key, key.modifiers), (ConsoleKey::LeftArrow, Modifiers::CTRL));
    }

    #[test]
    fn test_lone_escape() {
        let (mock, reader, writer, caps) = setup(true);
        mock.push_input(b"\x1b");
        assert_eq!(reader.read_key(true, &caps, &writer).unwrap().key, ConsoleKey::Escape);
    }

    #[test]
    fn test_echo_unless_intercepted() {
        let (mock, reader, writer, caps) = setup(true);
        mock.push_input("é\r\x1bOA".as_bytes());
        reader.read_key(false, &caps, &writer).unwrap();
        reader.read_key(false, &caps, &writer).unwrap();
        reader.read_key(false, &caps, &writer).unwrap();
        assert_eq!(mock.output_string(), "é\r\n");
    }

    #[test]
    fn test_echo_tab_but_not_control_keys() {
        let (mock, reader, writer, caps) = setup(true);
        mock.push_input(b"\t\x7f\x01");
        for _ in 0..3 {
            reader.read_key(false, &caps, &writer).unwrap();
        }
        assert_eq!(mock.output_string(), "\t");
    }

    #[test]
    fn test_redirected_input_skips_key_table() {
        let (mock, reader, writer, caps) = setup(false);
        mock.push_input(b"\x1bOA");
        assert_eq!(reader.read_key(true, &caps, &writer).unwrap().key, ConsoleKey::Escape);
        assert_eq!(reader.read_key(true, &caps, &writer).unwrap().key, ConsoleKey::Char('O'));
        assert_eq!(mock.raw_entries(), 0);
    }

    #[test]
    fn test_end_of_input() {
        let (_mock, reader, writer, caps) = setup(true);
        let err = reader.read_key(true, &caps, &writer).unwrap_err();
        assert!(matches!(err, ConsoleError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_key_available() {
        let (mock, reader, writer, caps) = setup(true);
        assert!(!reader.key_available().unwrap());
        mock.push_input(b"ab");
        assert!(reader.key_available().unwrap());
        reader.read_key(true, &caps, &writer).unwrap();
        // "b" is still buffered
        assert!(reader.key_available().unwrap());
        reader.read_key(true, &caps, &writer).unwrap();
        assert!(!reader.key_available().unwrap());
    }
}
