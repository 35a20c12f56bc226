//! Terminal description database
//!
//! [`CapabilityDatabase`] is the interface the console layer reads
//! capabilities through. [`TermDescription`] is an in-memory implementation
//! carrying built-in descriptions for the common terminal families; any
//! capability can be overridden after construction.

use std::collections::HashMap;

use super::caps::{NumberCap, StringCap};

/// Source of named terminal capabilities
pub trait CapabilityDatabase: Send + Sync {
    /// Terminal type name (the `TERM` value the description was chosen for)
    fn term(&self) -> &str;

    /// Standard string capability
    fn get_string(&self, cap: StringCap) -> Option<&str>;

    /// Standard numeric capability
    fn get_number(&self, cap: NumberCap) -> Option<i32>;

    /// User-defined (extended) string capability such as `kUP5`
    fn get_extended_string(&self, name: &str) -> Option<&str>;
}

/// In-memory terminal description
#[derive(Debug, Clone, Default)]
pub struct TermDescription {
    term: String,
    strings: HashMap<String, String>,
    numbers: HashMap<String, i32>,
    extended: HashMap<String, String>,
}

impl TermDescription {
    /// Description with no capabilities at all
    pub fn empty(term: &str) -> Self {
        Self {
            term: term.to_string(),
            ..Default::default()
        }
    }

    /// Built-in description for a terminal type, if the family is known
    pub fn builtin(term: &str) -> Option<Self> {
        let mut desc = Self::empty(term);
        let wide_colors = term.contains("256color");

        if term.starts_with("xterm")
            || term.starts_with("konsole")
            || term.starts_with("gnome")
            || term.starts_with("alacritty")
        {
            desc.xterm(if wide_colors { 256 } else { 8 });
        } else if term.starts_with("tmux") {
            desc.screen(if wide_colors { 256 } else { 8 });
            xterm_modified_keys(&mut desc);
        } else if term.starts_with("screen") {
            desc.screen(if wide_colors { 256 } else { 8 });
        } else if term.starts_with("rxvt") {
            desc.rxvt(if wide_colors { 256 } else { 8 });
        } else if term.starts_with("linux") {
            desc.linux();
        } else if matches!(term, "vt100" | "vt102" | "vt220") {
            desc.vt100();
        } else if term == "dumb" {
            desc.set_string("bel", "\x07");
            desc.set_number("cols", 80);
        } else {
            return None;
        }

        Some(desc)
    }

    /// Built-in description for `term`, or an empty one when the family is unknown
    pub fn for_term(term: &str) -> Self {
        match Self::builtin(term) {
            Some(desc) => desc,
            None => {
                tracing::warn!("No terminal description for '{}', capabilities disabled", term);
                Self::empty(term)
            }
        }
    }

    /// Set (or replace) a string capability by short name
    pub fn set_string(&mut self, name: &str, value: &str) {
        self.strings.insert(name.to_string(), value.to_string());
    }

    /// Set (or replace) a numeric capability by short name
    pub fn set_number(&mut self, name: &str, value: i32) {
        self.numbers.insert(name.to_string(), value);
    }

    /// Set (or replace) an extended string capability
    pub fn set_extended(&mut self, name: &str, value: &str) {
        self.extended.insert(name.to_string(), value.to_string());
    }

    /// Builder form of [`set_string`](Self::set_string)
    pub fn with_string(mut self, name: &str, value: &str) -> Self {
        self.set_string(name, value);
        self
    }

    /// Builder form of [`set_number`](Self::set_number)
    pub fn with_number(mut self, name: &str, value: i32) -> Self {
        self.set_number(name, value);
        self
    }

    /// Number of string capabilities (standard and extended)
    pub fn string_count(&self) -> usize {
        self.strings.len() + self.extended.len()
    }

    fn ansi_common(&mut self) {
        self.set_string("bel", "\x07");
        self.set_string("cup", "\x1b[%i%p1%d;%p2%dH");
        self.set_string("civis", "\x1b[?25l");
        self.set_string("cnorm", "\x1b[?25h");
        self.set_string("u7", "\x1b[6n");
        self.set_string("kbs", "\x7f");
        self.set_string("kcbt", "\x1b[Z");
        self.set_string("kich1", "\x1b[2~");
        self.set_string("kdch1", "\x1b[3~");
        self.set_string("kpp", "\x1b[5~");
        self.set_string("knp", "\x1b[6~");
        self.set_number("cols", 80);
        self.set_number("lines", 24);
    }

    fn ansi_colors(&mut self, colors: i32) {
        self.set_string("op", "\x1b[39;49m");
        if colors >= 256 {
            self.set_string(
                "setaf",
                "\x1b[%?%p1%{8}%<%t3%p1%d%e%p1%{16}%<%t9%p1%{8}%-%d%e38;5;%p1%d%;m",
            );
            self.set_string(
                "setab",
                "\x1b[%?%p1%{8}%<%t4%p1%d%e%p1%{16}%<%t10%p1%{8}%-%d%e48;5;%p1%d%;m",
            );
        } else {
            self.set_string("setaf", "\x1b[3%p1%dm");
            self.set_string("setab", "\x1b[4%p1%dm");
        }
        self.set_number("colors", colors);
    }

    fn application_cursor_keys(&mut self) {
        self.set_string("kcuu1", "\x1bOA");
        self.set_string("kcud1", "\x1bOB");
        self.set_string("kcuf1", "\x1bOC");
        self.set_string("kcub1", "\x1bOD");
        self.set_string("kent", "\x1bOM");
    }

    fn normal_cursor_keys(&mut self) {
        self.set_string("kcuu1", "\x1b[A");
        self.set_string("kcud1", "\x1b[B");
        self.set_string("kcuf1", "\x1b[C");
        self.set_string("kcub1", "\x1b[D");
    }

    /// F1-F4 as SS3 P..S, F5-F12 as CSI n ~, F13-F24 as their shifted forms
    fn vt220_function_keys(&mut self, shifted: bool) {
        const TILDE_CODES: [u8; 8] = [15, 17, 18, 19, 20, 21, 23, 24];
        for (i, last) in [b'P', b'Q', b'R', b'S'].iter().enumerate() {
            self.set_string(&format!("kf{}", i + 1), &format!("\x1bO{}", *last as char));
            if shifted {
                self.set_string(&format!("kf{}", i + 13), &format!("\x1b[1;2{}", *last as char));
            }
        }
        for (i, code) in TILDE_CODES.iter().enumerate() {
            self.set_string(&format!("kf{}", i + 5), &format!("\x1b[{}~", code));
            if shifted {
                self.set_string(&format!("kf{}", i + 17), &format!("\x1b[{};2~", code));
            }
        }
    }

    fn xterm(&mut self, colors: i32) {
        self.ansi_common();
        self.ansi_colors(colors);
        self.application_cursor_keys();
        self.vt220_function_keys(true);
        self.set_string("clear", "\x1b[H\x1b[2J");
        self.set_string("cnorm", "\x1b[?12l\x1b[?25h");
        self.set_string("smkx", "\x1b[?1h\x1b=");
        self.set_string("rmkx", "\x1b[?1l\x1b>");
        self.set_string("khome", "\x1bOH");
        self.set_string("kend", "\x1bOF");
        xterm_modified_keys(self);
    }

    fn screen(&mut self, colors: i32) {
        self.ansi_common();
        self.ansi_colors(colors);
        self.application_cursor_keys();
        self.vt220_function_keys(false);
        self.set_string("clear", "\x1b[H\x1b[J");
        self.set_string("cnorm", "\x1b[34h\x1b[?25h");
        self.set_string("smkx", "\x1b[?1h\x1b=");
        self.set_string("rmkx", "\x1b[?1l\x1b>");
        self.set_string("khome", "\x1b[1~");
        self.set_string("kend", "\x1b[4~");
    }

    fn rxvt(&mut self, colors: i32) {
        const F_CODES: [u8; 20] = [
            11, 12, 13, 14, 15, 17, 18, 19, 20, 21, 23, 24, 25, 26, 28, 29, 31, 32, 33, 34,
        ];
        self.ansi_common();
        self.ansi_colors(colors);
        self.normal_cursor_keys();
        self.set_string("clear", "\x1b[H\x1b[2J");
        self.set_string("smkx", "\x1b=");
        self.set_string("rmkx", "\x1b>");
        self.set_string("khome", "\x1b[7~");
        self.set_string("kend", "\x1b[8~");
        self.set_string("kent", "\x1bOM");
        for (i, code) in F_CODES.iter().enumerate() {
            self.set_string(&format!("kf{}", i + 1), &format!("\x1b[{}~", code));
        }
        self.set_extended("kUP", "\x1b[a");
        self.set_extended("kDN", "\x1b[b");
        self.set_extended("kRIT", "\x1b[c");
        self.set_extended("kLFT", "\x1b[d");
    }

    fn linux(&mut self) {
        const F_CODES: [u8; 15] = [17, 18, 19, 20, 21, 23, 24, 25, 26, 28, 29, 31, 32, 33, 34];
        self.ansi_common();
        self.ansi_colors(8);
        self.normal_cursor_keys();
        self.set_string("clear", "\x1b[H\x1b[J");
        self.set_string("civis", "\x1b[?25l\x1b[?1c");
        self.set_string("cnorm", "\x1b[?25h\x1b[?0c");
        self.set_string("khome", "\x1b[1~");
        self.set_string("kend", "\x1b[4~");
        for (i, last) in [b'A', b'B', b'C', b'D', b'E'].iter().enumerate() {
            self.set_string(&format!("kf{}", i + 1), &format!("\x1b[[{}", *last as char));
        }
        for (i, code) in F_CODES.iter().enumerate() {
            self.set_string(&format!("kf{}", i + 6), &format!("\x1b[{}~", code));
        }
    }

    fn vt100(&mut self) {
        self.set_string("bel", "\x07");
        self.set_string("clear", "\x1b[H\x1b[J");
        self.set_string("cup", "\x1b[%i%p1%d;%p2%dH");
        self.set_string("smkx", "\x1b[?1h\x1b=");
        self.set_string("rmkx", "\x1b[?1l\x1b>");
        self.set_string("kbs", "\x08");
        self.application_cursor_keys();
        for (i, last) in [b'P', b'Q', b'R', b'S'].iter().enumerate() {
            self.set_string(&format!("kf{}", i + 1), &format!("\x1bO{}", *last as char));
        }
        self.set_number("cols", 80);
        self.set_number("lines", 24);
    }
}

/// xterm-style modifier-qualified navigation keys (`kUP`, `kUP3`..`kUP7`, ...)
fn xterm_modified_keys(desc: &mut TermDescription) {
    const LETTERS: [(&str, char); 6] = [
        ("kUP", 'A'),
        ("kDN", 'B'),
        ("kRIT", 'C'),
        ("kLFT", 'D'),
        ("kHOM", 'H'),
        ("kEND", 'F'),
    ];
    const TILDES: [(&str, u8); 4] = [("kIC", 2), ("kDC", 3), ("kPRV", 5), ("kNXT", 6)];

    for (name, last) in LETTERS {
        desc.set_extended(name, &format!("\x1b[1;2{}", last));
        for code in 3..=7 {
            desc.set_extended(&format!("{}{}", name, code), &format!("\x1b[1;{}{}", code, last));
        }
    }
    for (name, key) in TILDES {
        desc.set_extended(name, &format!("\x1b[{};2~", key));
        for code in 3..=7 {
            desc.set_extended(&format!("{}{}", name, code), &format!("\x1b[{};{}~", key, code));
        }
    }
}

impl CapabilityDatabase for TermDescription {
    fn term(&self) -> &str {
        &self.term
    }

    fn get_string(&self, cap: StringCap) -> Option<&str> {
        self.strings.get(cap.name().as_ref()).map(String::as_str)
    }

    fn get_number(&self, cap: NumberCap) -> Option<i32> {
        self.numbers.get(cap.name()).copied()
    }

    fn get_extended_string(&self, name: &str) -> Option<&str> {
        self.extended.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xterm_256color() {
        let desc = TermDescription::builtin("xterm-256color").unwrap();
        assert_eq!(desc.get_number(NumberCap::MaxColors), Some(256));
        assert_eq!(desc.get_string(StringCap::CursorPositionRequest), Some("\x1b[6n"));
        assert_eq!(desc.get_string(StringCap::KeyFunction(5)), Some("\x1b[15~"));
        assert_eq!(desc.get_string(StringCap::KeyFunction(17)), Some("\x1b[15;2~"));
        assert_eq!(desc.get_extended_string("kUP5"), Some("\x1b[1;5A"));
        assert_eq!(desc.get_extended_string("kDC"), Some("\x1b[3;2~"));
    }

    #[test]
    fn test_plain_xterm_has_eight_colors() {
        let desc = TermDescription::builtin("xterm").unwrap();
        assert_eq!(desc.get_number(NumberCap::MaxColors), Some(8));
        assert_eq!(desc.get_string(StringCap::SetAnsiForeground), Some("\x1b[3%p1%dm"));
    }

    #[test]
    fn test_linux_keys() {
        let desc = TermDescription::builtin("linux").unwrap();
        assert_eq!(desc.get_string(StringCap::KeyUp), Some("\x1b[A"));
        assert_eq!(desc.get_string(StringCap::KeyFunction(1)), Some("\x1b[[A"));
        assert_eq!(desc.get_string(StringCap::KeyFunction(20)), Some("\x1b[34~"));
        assert_eq!(desc.get_extended_string("kUP"), None);
    }

    #[test]
    fn test_unknown_terminal() {
        assert!(TermDescription::builtin("hp2621").is_none());
        let desc = TermDescription::for_term("hp2621");
        assert_eq!(desc.term(), "hp2621");
        assert_eq!(desc.string_count(), 0);
    }

    #[test]
    fn test_overrides_replace_builtin() {
        let desc = TermDescription::builtin("vt100")
            .unwrap()
            .with_string("bel", "")
            .with_number("colors", 16);
        assert_eq!(desc.get_string(StringCap::Bell), Some(""));
        assert_eq!(desc.get_number(NumberCap::MaxColors), Some(16));
    }
}
