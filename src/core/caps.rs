//! Capability resolution
//!
//! Reads everything the console needs from a [`CapabilityDatabase`] once and
//! keeps it as a [`CapabilitySet`]: output templates, geometry, color count
//! and the key table used to recognize input sequences. A capability that is
//! missing or empty resolves to `None`; the operation that needs it then
//! degrades at its call site.

use std::sync::OnceLock;

use tracing::{debug, info};

use super::keys::{ConsoleKey, KeyInfo, KeyTable, Modifiers};
use crate::terminfo::{CapabilityDatabase, NumberCap, StringCap, MAX_FUNCTION_KEY};

/// The only cursor position request the response parser understands
pub const CURSOR_POSITION_REQUEST: &str = "\x1b[6n";

/// Standard key capabilities: (capability, key, character, modifiers)
const KEY_CAPS: [(StringCap, ConsoleKey, char, Modifiers); 14] = [
    (StringCap::KeyBackspace, ConsoleKey::Backspace, '\x08', Modifiers::empty()),
    (StringCap::KeyBackTab, ConsoleKey::Tab, '\t', Modifiers::SHIFT),
    (StringCap::KeyClear, ConsoleKey::Clear, '\0', Modifiers::empty()),
    (StringCap::KeyDelete, ConsoleKey::Delete, '\0', Modifiers::empty()),
    (StringCap::KeyDown, ConsoleKey::DownArrow, '\0', Modifiers::empty()),
    (StringCap::KeyEnd, ConsoleKey::End, '\0', Modifiers::empty()),
    (StringCap::KeyEnter, ConsoleKey::Enter, '\r', Modifiers::empty()),
    (StringCap::KeyHome, ConsoleKey::Home, '\0', Modifiers::empty()),
    (StringCap::KeyInsert, ConsoleKey::Insert, '\0', Modifiers::empty()),
    (StringCap::KeyLeft, ConsoleKey::LeftArrow, '\0', Modifiers::empty()),
    (StringCap::KeyNextPage, ConsoleKey::PageDown, '\0', Modifiers::empty()),
    (StringCap::KeyPrevPage, ConsoleKey::PageUp, '\0', Modifiers::empty()),
    (StringCap::KeyRight, ConsoleKey::RightArrow, '\0', Modifiers::empty()),
    (StringCap::KeyUp, ConsoleKey::UpArrow, '\0', Modifiers::empty()),
];

/// Extended capability prefixes for modifier-qualified navigation keys.
/// `kUP` alone is Shift+Up; `kUP<n>` carries xterm modifier code `n`.
const MODIFIED_KEYS: [(&str, ConsoleKey); 10] = [
    ("kUP", ConsoleKey::UpArrow),
    ("kDN", ConsoleKey::DownArrow),
    ("kLFT", ConsoleKey::LeftArrow),
    ("kRIT", ConsoleKey::RightArrow),
    ("kHOM", ConsoleKey::Home),
    ("kEND", ConsoleKey::End),
    ("kPRV", ConsoleKey::PageUp),
    ("kNXT", ConsoleKey::PageDown),
    ("kDC", ConsoleKey::Delete),
    ("kIC", ConsoleKey::Insert),
];

const OSC_TITLE: &str = "\x1b]0;%p1%s\x07";

/// Title templates for terminals without `tsl`/`fsl`, matched by `TERM` prefix
const TITLE_FORMATS: [(&str, &str); 9] = [
    ("xterm", OSC_TITLE),
    ("aixterm", OSC_TITLE),
    ("dtterm", OSC_TITLE),
    ("linux", OSC_TITLE),
    ("rxvt", OSC_TITLE),
    ("tmux", OSC_TITLE),
    ("cygwin", "\x1b];%p1%s\x07"),
    ("konsole", "\x1b]30;|%p1%s\x07"),
    ("screen", "\x1bk%p1%s\x1b\\"),
];

/// Resolved capabilities for the active terminal
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    pub term: String,
    pub foreground: Option<String>,
    pub background: Option<String>,
    pub reset: Option<String>,
    /// Color count; 0 when the terminal has no color support
    pub max_colors: i32,
    pub columns: Option<u16>,
    pub lines: Option<u16>,
    pub cursor_visible: Option<String>,
    pub cursor_invisible: Option<String>,
    pub cursor_address: Option<String>,
    pub title: Option<String>,
    pub bell: Option<String>,
    pub clear: Option<String>,
    pub keypad_xmit: Option<String>,
    pub keypad_local: Option<String>,
    /// Present only when the terminal uses [`CURSOR_POSITION_REQUEST`]
    pub cursor_position_request: Option<String>,
    pub key_table: KeyTable,
}

impl CapabilitySet {
    pub fn from_database(db: &dyn CapabilityDatabase) -> Self {
        let string = |cap| non_empty(db.get_string(cap));
        let dimension = |cap| {
            db.get_number(cap)
                .filter(|n| *n > 0)
                .and_then(|n| u16::try_from(n).ok())
        };

        let cursor_position_request = match string(StringCap::CursorPositionRequest) {
            Some(req) if req == CURSOR_POSITION_REQUEST => Some(req),
            Some(other) => {
                debug!("Ignoring non-standard cursor position request {:?}", other);
                None
            }
            None => None,
        };

        Self {
            term: db.term().to_string(),
            foreground: string(StringCap::SetAnsiForeground),
            background: string(StringCap::SetAnsiBackground),
            reset: string(StringCap::OrigPair).or_else(|| string(StringCap::OrigColors)),
            max_colors: db.get_number(NumberCap::MaxColors).unwrap_or(0).max(0),
            columns: dimension(NumberCap::Columns),
            lines: dimension(NumberCap::Lines),
            cursor_visible: string(StringCap::CursorNormal),
            cursor_invisible: string(StringCap::CursorInvisible),
            cursor_address: string(StringCap::CursorAddress),
            title: title_format(db),
            bell: string(StringCap::Bell),
            clear: string(StringCap::Clear),
            keypad_xmit: string(StringCap::KeypadXmit),
            keypad_local: string(StringCap::KeypadLocal),
            cursor_position_request,
            key_table: build_key_table(db),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_string)
}

fn title_format(db: &dyn CapabilityDatabase) -> Option<String> {
    let to_status = non_empty(db.get_string(StringCap::ToStatusLine));
    let from_status = non_empty(db.get_string(StringCap::FromStatusLine));
    if let (Some(tsl), Some(fsl)) = (to_status, from_status) {
        return Some(format!("{}%p1%s{}", tsl, fsl));
    }

    let term = db.term();
    TITLE_FORMATS
        .iter()
        .find(|(prefix, _)| term.starts_with(prefix))
        .map(|(_, format)| format.to_string())
}

fn build_key_table(db: &dyn CapabilityDatabase) -> KeyTable {
    let mut table = KeyTable::new();

    for (cap, key, key_char, modifiers) in KEY_CAPS {
        if let Some(seq) = db.get_string(cap) {
            table.insert(seq.as_bytes(), KeyInfo::new(key_char, key, modifiers));
        }
    }

    for n in 1..=MAX_FUNCTION_KEY {
        if let Some(seq) = db.get_string(StringCap::KeyFunction(n)) {
            table.insert(
                seq.as_bytes(),
                KeyInfo::new('\0', ConsoleKey::F(n), Modifiers::empty()),
            );
        }
    }

    for (prefix, key) in MODIFIED_KEYS {
        if let Some(seq) = db.get_extended_string(prefix) {
            table.insert(seq.as_bytes(), KeyInfo::new('\0', key, Modifiers::SHIFT));
        }
        for code in 2..=8u8 {
            let Some(modifiers) = Modifiers::from_xterm_code(code) else {
                continue;
            };
            if let Some(seq) = db.get_extended_string(&format!("{}{}", prefix, code)) {
                table.insert(seq.as_bytes(), KeyInfo::new('\0', key, modifiers));
            }
        }
    }

    table
}

/// One-time capability resolution for a terminal description
pub struct CapabilityRegistry {
    db: Box<dyn CapabilityDatabase>,
    resolved: OnceLock<CapabilitySet>,
}

impl CapabilityRegistry {
    pub fn new(db: Box<dyn CapabilityDatabase>) -> Self {
        Self {
            db,
            resolved: OnceLock::new(),
        }
    }

    /// Resolve on first call; later and concurrent callers get the same set
    pub fn resolve(&self) -> &CapabilitySet {
        self.resolved.get_or_init(|| {
            let caps = CapabilitySet::from_database(self.db.as_ref());
            info!(
                "Resolved terminal '{}': {} colors, {} key sequences, cursor query {}",
                caps.term,
                caps.max_colors,
                caps.key_table.len(),
                if caps.cursor_position_request.is_some() { "available" } else { "unavailable" },
            );
            caps
        })
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }
}
