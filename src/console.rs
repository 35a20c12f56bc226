//! Public console operations
//!
//! [`Console`] owns every piece of console state explicitly: the resolved
//! capabilities, the output writer, the input buffer and the tracked colors.
//! Output-only operations whose capability is missing are silent no-ops;
//! queries with no fallback report [`ConsoleError::Unsupported`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::caps::{CapabilityRegistry, CapabilitySet};
use crate::core::color::{ColorChannel, ColorStateTracker, ConsoleColor};
use crate::core::cursor;
use crate::core::input::InputReader;
use crate::core::io::{RawModeGuard, TerminalIo};
use crate::core::keys::KeyInfo;
use crate::core::writer::AnsiWriter;
use crate::error::{ConsoleError, Result};
use crate::terminfo::{self, CapabilityDatabase, Param};

pub struct Console {
    registry: CapabilityRegistry,
    io: Arc<dyn TerminalIo>,
    writer: AnsiWriter,
    input: InputReader,
    colors: ColorStateTracker,
}

impl Console {
    /// Console over the process's standard descriptors, described by `config`
    #[cfg(unix)]
    pub fn open(config: &crate::config::Config) -> Self {
        let io = Arc::new(crate::core::io::StdTerminal::new());
        Self::new(Box::new(config.describe_terminal()), io)
    }

    /// Resolve capabilities from `db` and switch the keypad to transmit mode
    pub fn new(db: Box<dyn CapabilityDatabase>, io: Arc<dyn TerminalIo>) -> Self {
        let registry = CapabilityRegistry::new(db);
        let console = Self {
            registry,
            writer: AnsiWriter::new(io.clone()),
            input: InputReader::new(io.clone()),
            colors: ColorStateTracker::new(),
            io,
        };

        let caps = console.registry.resolve();
        if let Some(smkx) = &caps.keypad_xmit {
            if let Err(e) = console.writer.write_escape(smkx) {
                warn!("Failed to enable keypad transmit mode: {}", e);
            }
        }
        console
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        self.registry.resolve()
    }

    // ---- Colors ----

    pub fn foreground_color(&self) -> Option<ConsoleColor> {
        self.colors.get(ColorChannel::Foreground)
    }

    pub fn background_color(&self) -> Option<ConsoleColor> {
        self.colors.get(ColorChannel::Background)
    }

    pub fn set_foreground_color(&self, color: ConsoleColor) -> Result<()> {
        self.set_color(ColorChannel::Foreground, Some(color))
    }

    pub fn set_background_color(&self, color: ConsoleColor) -> Result<()> {
        self.set_color(ColorChannel::Background, Some(color))
    }

    /// Select a color for one channel, or clear it with `None`
    pub fn set_color(&self, channel: ColorChannel, color: Option<ConsoleColor>) -> Result<()> {
        self.colors.set(channel, color, self.capabilities(), &self.writer)
    }

    /// Select a color by raw value (`-1` clears); out-of-range values are rejected
    pub fn set_color_value(&self, channel: ColorChannel, value: i32) -> Result<()> {
        self.colors
            .set_value(channel, value, self.capabilities(), &self.writer)
    }

    pub fn reset_color(&self) -> Result<()> {
        self.colors.reset(self.capabilities(), &self.writer)
    }

    // ---- Screen ----

    pub fn clear(&self) -> Result<()> {
        self.emit(self.capabilities().clear.as_deref())
    }

    pub fn beep(&self) -> Result<()> {
        self.emit(self.capabilities().bell.as_deref())
    }

    /// Programmatic tones cannot be expressed through a terminal
    pub fn beep_with(&self, _frequency: u32, _duration_ms: u32) -> Result<()> {
        Err(ConsoleError::Unsupported("beep with frequency and duration"))
    }

    pub fn set_title(&self, title: &str) -> Result<()> {
        let Some(template) = self.capabilities().title.as_deref() else {
            debug!("No title capability for {}", self.capabilities().term);
            return Ok(());
        };
        if !self.writer.escapes_enabled() {
            return Ok(());
        }
        let seq = terminfo::evaluate(template, &[Param::from(title)])?;
        self.emit(Some(&seq))
    }

    pub fn title(&self) -> Result<String> {
        Err(ConsoleError::Unsupported("reading the window title"))
    }

    // ---- Cursor ----

    pub fn cursor_visible(&self) -> Result<bool> {
        Err(ConsoleError::Unsupported("reading cursor visibility"))
    }

    pub fn set_cursor_visible(&self, visible: bool) -> Result<()> {
        let caps = self.capabilities();
        if visible {
            self.emit(caps.cursor_visible.as_deref())
        } else {
            self.emit(caps.cursor_invisible.as_deref())
        }
    }

    pub fn set_cursor_size(&self, _percent: u8) -> Result<()> {
        Err(ConsoleError::Unsupported("setting the cursor size"))
    }

    /// Zero-based `(left, top)` of the cursor
    pub fn cursor_position(&self) -> Result<(u16, u16)> {
        let (row, col) = cursor::query_position(
            self.io.as_ref(),
            self.capabilities(),
            &self.writer,
            &self.input,
        )?;
        Ok((col, row))
    }

    /// Move the cursor to zero-based column `left`, row `top`
    pub fn set_cursor_position(&self, left: u16, top: u16) -> Result<()> {
        let Some(template) = self.capabilities().cursor_address.as_deref() else {
            return Ok(());
        };
        if !self.writer.escapes_enabled() {
            return Ok(());
        }
        let seq = terminfo::evaluate(
            template,
            &[Param::from(i32::from(top)), Param::from(i32::from(left))],
        )?;
        self.emit(Some(&seq))
    }

    // ---- Window ----

    pub fn window_width(&self) -> Result<u16> {
        match self.io.window_size() {
            Ok(size) if size.columns > 0 => return Ok(size.columns),
            Ok(_) => {}
            Err(e) => debug!("Window size query failed: {}", e),
        }
        self.capabilities()
            .columns
            .ok_or(ConsoleError::Unsupported("querying the window width"))
    }

    pub fn window_height(&self) -> Result<u16> {
        match self.io.window_size() {
            Ok(size) if size.rows > 0 => return Ok(size.rows),
            Ok(_) => {}
            Err(e) => debug!("Window size query failed: {}", e),
        }
        self.capabilities()
            .lines
            .ok_or(ConsoleError::Unsupported("querying the window height"))
    }

    pub fn set_window_size(&self, _columns: u16, _rows: u16) -> Result<()> {
        Err(ConsoleError::Unsupported("resizing the window"))
    }

    pub fn set_window_position(&self, _left: u16, _top: u16) -> Result<()> {
        Err(ConsoleError::Unsupported("moving the window"))
    }

    pub fn set_buffer_size(&self, _columns: u16, _rows: u16) -> Result<()> {
        Err(ConsoleError::Unsupported("resizing the screen buffer"))
    }

    pub fn move_buffer_area(
        &self,
        _source: (u16, u16, u16, u16),
        _target_left: u16,
        _target_top: u16,
    ) -> Result<()> {
        Err(ConsoleError::Unsupported("copying screen buffer areas"))
    }

    // ---- Input ----

    /// Block until a key arrives; echoes it unless `intercept` is set
    pub fn read_key(&self, intercept: bool) -> Result<KeyInfo> {
        self.input
            .read_key(intercept, self.capabilities(), &self.writer)
    }

    pub fn key_available(&self) -> Result<bool> {
        self.input.key_available()
    }

    /// Hold the terminal in raw mode across several reads
    pub fn raw_mode(&self) -> Result<RawModeGuard<'_>> {
        Ok(RawModeGuard::enable(self.io.as_ref())?)
    }

    // ---- Text and redirection ----

    /// Write plain text under the output lock
    pub fn write(&self, text: &str) -> Result<()> {
        Ok(self.writer.write_text(text)?)
    }

    pub fn is_input_redirected(&self) -> bool {
        !self.io.is_input_terminal()
    }

    pub fn is_output_redirected(&self) -> bool {
        !self.io.is_output_terminal()
    }

    fn emit(&self, sequence: Option<&str>) -> Result<()> {
        match sequence {
            Some(seq) => Ok(self.writer.write_escape(seq)?),
            None => Ok(()),
        }
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        if let Some(rmkx) = &self.registry.resolve().keypad_local {
            if let Err(e) = self.writer.write_escape(rmkx) {
                warn!("Failed to restore keypad mode: {}", e);
            }
        }
        info!("Console closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::mock::MockTerminal;
    use crate::core::keys::{ConsoleKey, Modifiers};
    use crate::terminfo::TermDescription;

    fn setup(desc: TermDescription, mock: MockTerminal) -> (Arc<MockTerminal>, Console) {
        let mock = Arc::new(mock);
        let console = Console::new(Box::new(desc), mock.clone());
        mock.clear_output();
        (mock, console)
    }

    fn xterm() -> (Arc<MockTerminal>, Console) {
        setup(TermDescription::builtin("xterm").unwrap(), MockTerminal::new())
    }

    #[test]
    fn test_keypad_mode_lifecycle() {
        let mock = Arc::new(MockTerminal::new());
        let console = Console::new(
            Box::new(TermDescription::builtin("xterm").unwrap()),
            mock.clone(),
        );
        assert_eq!(mock.output_string(), "\x1b[?1h\x1b=");
        mock.clear_output();
        drop(console);
        assert_eq!(mock.output_string(), "\x1b[?1l\x1b>");
    }

    #[test]
    fn test_foreground_then_background() {
        let (mock, console) = xterm();
        console.set_foreground_color(ConsoleColor::DarkRed).unwrap();
        mock.clear_output();
        console.set_background_color(ConsoleColor::DarkBlue).unwrap();
        assert_eq!(mock.output_string(), "\x1b[39;49m\x1b[31m\x1b[44m");
        assert_eq!(console.foreground_color(), Some(ConsoleColor::DarkRed));
        assert_eq!(console.background_color(), Some(ConsoleColor::DarkBlue));
    }

    #[test]
    fn test_invalid_color_leaves_state() {
        let (mock, console) = xterm();
        console.set_foreground_color(ConsoleColor::Green).unwrap();
        mock.clear_output();

        let err = console
            .set_color_value(ColorChannel::Foreground, 16)
            .unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidColor(16)));
        assert_eq!(console.foreground_color(), Some(ConsoleColor::Green));
        assert!(mock.output().is_empty());

        console.set_color_value(ColorChannel::Foreground, -1).unwrap();
        assert_eq!(console.foreground_color(), None);
    }

    #[test]
    fn test_redirected_output_emits_nothing() {
        let (mock, console) = setup(
            TermDescription::builtin("xterm").unwrap(),
            MockTerminal::with_tty(true, false),
        );
        assert!(console.is_output_redirected());
        console.set_foreground_color(ConsoleColor::Yellow).unwrap();
        console.reset_color().unwrap();
        console.set_background_color(ConsoleColor::Blue).unwrap();
        console.clear().unwrap();
        console.beep().unwrap();
        console.set_cursor_visible(false).unwrap();
        console.set_title("build").unwrap();
        console.set_cursor_position(3, 4).unwrap();
        assert!(mock.output().is_empty());
        assert_eq!(console.background_color(), Some(ConsoleColor::Blue));
        assert_eq!(console.foreground_color(), None);
    }

    #[test]
    fn test_screen_operations() {
        let (mock, console) = xterm();
        console.clear().unwrap();
        console.beep().unwrap();
        console.set_cursor_visible(false).unwrap();
        console.set_cursor_visible(true).unwrap();
        assert_eq!(
            mock.output_string(),
            "\x1b[H\x1b[2J\x07\x1b[?25l\x1b[?12l\x1b[?25h"
        );
    }

    #[test]
    fn test_set_cursor_position_is_one_based_row_first() {
        let (mock, console) = xterm();
        console.set_cursor_position(9, 4).unwrap();
        assert_eq!(mock.output_string(), "\x1b[5;10H");
    }

    #[test]
    fn test_title_formats() {
        let (mock, console) = xterm();
        console.set_title("hello").unwrap();
        assert_eq!(mock.output_string(), "\x1b]0;hello\x07");

        let desc = TermDescription::builtin("screen")
            .unwrap()
            .with_string("tsl", "\x1b]2;")
            .with_string("fsl", "\x07");
        let (mock, console) = setup(desc, MockTerminal::new());
        console.set_title("x").unwrap();
        assert_eq!(mock.output_string(), "\x1b]2;x\x07");
    }

    #[test]
    fn test_missing_capabilities_are_no_ops() {
        let (mock, console) = setup(TermDescription::empty("unknown"), MockTerminal::new());
        console.set_foreground_color(ConsoleColor::Red).unwrap();
        console.clear().unwrap();
        console.beep().unwrap();
        console.set_title("t").unwrap();
        console.set_cursor_position(1, 1).unwrap();
        assert!(mock.output().is_empty());
        assert_eq!(console.cursor_position().unwrap(), (0, 0));
    }

    #[test]
    fn test_cursor_position_is_left_top() {
        let (mock, console) = xterm();
        mock.push_input(b"\x1b[12;34R");
        assert_eq!(console.cursor_position().unwrap(), (33, 11));
    }

    #[test]
    fn test_window_size_fallbacks() {
        let (_mock, console) = xterm();
        assert_eq!(console.window_width().unwrap(), 120);
        assert_eq!(console.window_height().unwrap(), 40);

        let (_mock, console) = setup(
            TermDescription::builtin("vt100").unwrap(),
            MockTerminal::new().without_size(),
        );
        assert_eq!(console.window_width().unwrap(), 80);
        assert_eq!(console.window_height().unwrap(), 24);

        let (_mock, console) = setup(
            TermDescription::empty("unknown"),
            MockTerminal::new().without_size(),
        );
        assert!(matches!(
            console.window_width(),
            Err(ConsoleError::Unsupported(_))
        ));
    }

    #[test]
    fn test_unsupported_operations() {
        let (mock, console) = xterm();
        assert!(matches!(console.title(), Err(ConsoleError::Unsupported(_))));
        assert!(matches!(console.cursor_visible(), Err(ConsoleError::Unsupported(_))));
        assert!(console.set_buffer_size(80, 24).is_err());
        assert!(console.set_window_size(80, 24).is_err());
        assert!(console.set_window_position(0, 0).is_err());
        assert!(console.move_buffer_area((0, 0, 1, 1), 2, 2).is_err());
        assert!(console.set_cursor_size(50).is_err());
        assert!(console.beep_with(440, 100).is_err());
        assert!(mock.output().is_empty());
    }

    #[test]
    fn test_read_key_through_console() {
        let (mock, console) = xterm();
        assert!(!console.key_available().unwrap());
        mock.push_input(b"\x1b[1;3C");
        assert!(console.key_available().unwrap());
        let key = console.read_key(true).unwrap();
        assert_eq!(key.key, ConsoleKey::RightArrow);
        assert_eq!(key.modifiers, Modifiers::ALT);
    }

    #[test]
    fn test_raw_mode_spans_reads() {
        let (mock, console) = xterm();
        mock.push_input(b"ab");
        {
            let _raw = console.raw_mode().unwrap();
            console.read_key(true).unwrap();
            assert!(mock.is_raw());
            console.read_key(true).unwrap();
            assert!(mock.is_raw());
        }
        assert!(!mock.is_raw());
    }

    #[test]
    fn test_write_text_is_never_suppressed() {
        let (mock, console) = setup(
            TermDescription::builtin("xterm").unwrap(),
            MockTerminal::with_tty(false, false),
        );
        console.write("plain text\n").unwrap();
        assert_eq!(mock.output_string(), "plain text\n");
        assert!(console.is_input_redirected());
    }

    #[test]
    fn test_write_errors_propagate() {
        let (mock, console) = xterm();
        mock.fail_writes(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(console.clear(), Err(ConsoleError::Io(_))));

        mock.fail_writes(std::io::ErrorKind::BrokenPipe);
        console.clear().unwrap();
    }

    #[test]
    fn test_concurrent_color_changes_never_interleave() {
        let (mock, console) = xterm();
        let console = Arc::new(console);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let console = Arc::clone(&console);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let color = ConsoleColor::ALL[(t + i) % ConsoleColor::ALL.len()];
                        console.set_foreground_color(color).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // One reset plus one foreground escape per call, never split
        let output = mock.output_string();
        let parts: Vec<&str> = output.split("\x1b[39;49m").skip(1).collect();
        assert_eq!(parts.len(), 400);
        for part in parts {
            let digit = part
                .strip_prefix("\x1b[3")
                .and_then(|rest| rest.strip_suffix('m'))
                .unwrap_or_else(|| panic!("interleaved color output: {:?}", part));
            assert!(matches!(digit, "0" | "1" | "2" | "3" | "4" | "5" | "6" | "7"));
        }
    }

    #[test]
    fn test_key_read_waits_for_cursor_query() {
        let (mock, console) = setup(
            TermDescription::builtin("xterm").unwrap(),
            MockTerminal::new().blocking(),
        );
        let console = Arc::new(console);

        let query = {
            let console = Arc::clone(&console);
            std::thread::spawn(move || console.cursor_position())
        };
        // The request is written while the query holds the input lock
        while !mock.output_string().contains("\x1b[6n") {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        let reader = {
            let console = Arc::clone(&console);
            std::thread::spawn(move || console.read_key(true))
        };

        mock.push_input(b"\x1b[5;6R");
        assert_eq!(query.join().unwrap().unwrap(), (5, 4));

        mock.push_input(b"k");
        let key = reader.join().unwrap().unwrap();
        assert_eq!(key.key, ConsoleKey::Char('k'));
        assert!(!mock.is_raw());
    }
}
