//! Key recognition for terminal input
//!
//! Maps raw input bytes back to logical keys: escape sequences through the
//! capability-derived [`KeyTable`], everything else as ordinary characters.

use std::collections::HashMap;

use bitflags::bitflags;

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl Modifiers {
    /// Decode an xterm modifier parameter (`2..=8`, as in `ESC [ 1 ; 5 A`)
    pub fn from_xterm_code(code: u8) -> Option<Self> {
        if !(2..=8).contains(&code) {
            return None;
        }
        let bits = code - 1;
        let mut mods = Modifiers::empty();
        if bits & 1 != 0 {
            mods |= Modifiers::SHIFT;
        }
        if bits & 2 != 0 {
            mods |= Modifiers::ALT;
        }
        if bits & 4 != 0 {
            mods |= Modifiers::CTRL;
        }
        Some(mods)
    }

    /// Calculate xterm modifier code
    pub fn xterm_code(self) -> u8 {
        1 + if self.contains(Modifiers::SHIFT) { 1 } else { 0 }
            + if self.contains(Modifiers::ALT) { 2 } else { 0 }
            + if self.contains(Modifiers::CTRL) { 4 } else { 0 }
    }
}

/// Logical key identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConsoleKey {
    Backspace,
    Tab,
    Clear,
    Enter,
    Escape,
    PageUp,
    PageDown,
    End,
    Home,
    LeftArrow,
    UpArrow,
    RightArrow,
    DownArrow,
    Insert,
    Delete,
    /// Function key F1..F24
    F(u8),
    /// Any key that produces an ordinary character
    Char(char),
}

/// A recognized key press
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyInfo {
    /// Character the key produces, `'\0'` for non-printing keys
    pub key_char: char,
    pub key: ConsoleKey,
    pub modifiers: Modifiers,
}

impl KeyInfo {
    pub const fn new(key_char: char, key: ConsoleKey, modifiers: Modifiers) -> Self {
        Self {
            key_char,
            key,
            modifiers,
        }
    }

    /// Interpret a character that did not match any key sequence
    pub fn from_char(ch: char) -> Self {
        match ch {
            '\r' | '\n' => Self::new(ch, ConsoleKey::Enter, Modifiers::empty()),
            '\t' => Self::new(ch, ConsoleKey::Tab, Modifiers::empty()),
            '\x7f' | '\x08' => Self::new('\x08', ConsoleKey::Backspace, Modifiers::empty()),
            '\x1b' => Self::new(ch, ConsoleKey::Escape, Modifiers::empty()),
            '\0' => Self::new(ch, ConsoleKey::Char('@'), Modifiers::CTRL),
            // Ctrl+A .. Ctrl+Z
            '\x01'..='\x1a' => {
                let letter = char::from(b'a' + (ch as u8) - 1);
                Self::new(ch, ConsoleKey::Char(letter), Modifiers::CTRL)
            }
            c if c.is_ascii_uppercase() => Self::new(c, ConsoleKey::Char(c), Modifiers::SHIFT),
            c => Self::new(c, ConsoleKey::Char(c), Modifiers::empty()),
        }
    }
}

/// Registered escape sequences, keyed by their raw bytes
#[derive(Debug, Default, Clone)]
pub struct KeyTable {
    entries: HashMap<Vec<u8>, KeyInfo>,
    min_len: usize,
    max_len: usize,
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sequence. Empty sequences are ignored; a sequence that is
    /// already present is rebound (last write wins).
    pub fn insert(&mut self, sequence: &[u8], info: KeyInfo) {
        if sequence.is_empty() {
            return;
        }
        if self.entries.is_empty() {
            self.min_len = sequence.len();
            self.max_len = sequence.len();
        } else {
            self.min_len = self.min_len.min(sequence.len());
            self.max_len = self.max_len.max(sequence.len());
        }
        self.entries.insert(sequence.to_vec(), info);
    }

    pub fn get(&self, sequence: &[u8]) -> Option<&KeyInfo> {
        self.entries.get(sequence)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shortest registered sequence length (0 when empty)
    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Longest registered sequence length (0 when empty)
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Find the longest registered sequence at the start of `input`.
    ///
    /// Returns the bound key and the number of bytes it consumed. Candidate
    /// lengths are tried from `min(input.len(), max_len)` down to `min_len`,
    /// so a modified key like `ESC [ 1 ; 5 A` wins over any shorter entry it
    /// starts with.
    pub fn match_key(&self, input: &[u8]) -> Option<(KeyInfo, usize)> {
        if self.entries.is_empty() || input.len() < self.min_len {
            return None;
        }
        let longest = input.len().min(self.max_len);
        (self.min_len..=longest)
            .rev()
            .find_map(|len| self.entries.get(&input[..len]).map(|info| (*info, len)))
    }

    /// Whether `input` is a strict prefix of some registered sequence,
    /// meaning more bytes could still complete a key.
    pub fn is_partial(&self, input: &[u8]) -> bool {
        !input.is_empty()
            && input.len() < self.max_len
            && self
                .entries
                .keys()
                .any(|seq| seq.len() > input.len() && seq.starts_with(input))
    }
}

/// Decode the first UTF-8 character of `bytes`.
///
/// Returns `None` when the buffer holds only the start of a valid multi-byte
/// character. Invalid bytes decode one at a time as U+FFFD.
pub fn decode_char(bytes: &[u8]) -> Option<(char, usize)> {
    let first = *bytes.first()?;
    let width = match first {
        0x00..=0x7F => return Some((char::from(first), 1)),
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return Some((char::REPLACEMENT_CHARACTER, 1)),
    };

    // Overlong forms, surrogates and code points past U+10FFFF are ruled out
    // by the second byte alone
    let second = match first {
        0xE0 => 0xA0..=0xBF,
        0xED => 0x80..=0x9F,
        0xF0 => 0x90..=0xBF,
        0xF4 => 0x80..=0x8F,
        _ => 0x80..=0xBF,
    };
    if bytes.get(1).is_some_and(|b| !second.contains(b)) {
        return Some((char::REPLACEMENT_CHARACTER, 1));
    }

    let available = bytes.len().min(width);
    if bytes[1..available].iter().any(|b| b & 0xC0 != 0x80) {
        return Some((char::REPLACEMENT_CHARACTER, 1));
    }
    if available < width {
        return None;
    }

    match std::str::from_utf8(&bytes[..width]) {
        Ok(s) => s.chars().next().map(|c| (c, width)),
        Err(_) => Some((char::REPLACEMENT_CHARACTER, 1)),
    }
}
