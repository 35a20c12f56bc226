//! Capability identifiers
//!
//! Typed names for the terminfo capabilities the console layer consumes.
//! Each identifier maps to its terminfo short name, which is the key used by
//! [`CapabilityDatabase`](super::CapabilityDatabase) implementations.

use std::borrow::Cow;

/// Highest function key number looked up in the database (`kf1`..`kf24`).
pub const MAX_FUNCTION_KEY: u8 = 24;

/// String capabilities
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StringCap {
    Bell,
    Clear,
    CursorAddress,
    CursorInvisible,
    CursorNormal,
    /// User string 7, conventionally the cursor position request
    CursorPositionRequest,
    KeypadXmit,
    KeypadLocal,
    OrigPair,
    OrigColors,
    SetAnsiForeground,
    SetAnsiBackground,
    ToStatusLine,
    FromStatusLine,

    // Keys
    KeyBackspace,
    KeyBackTab,
    KeyClear,
    KeyDelete,
    KeyDown,
    KeyEnd,
    KeyEnter,
    KeyHome,
    KeyInsert,
    KeyLeft,
    KeyNextPage,
    KeyPrevPage,
    KeyRight,
    KeyUp,
    /// `kf<n>`, valid for 1..=[`MAX_FUNCTION_KEY`]
    KeyFunction(u8),
}

impl StringCap {
    /// Terminfo short name
    pub fn name(self) -> Cow<'static, str> {
        let name = match self {
            StringCap::Bell => "bel",
            StringCap::Clear => "clear",
            StringCap::CursorAddress => "cup",
            StringCap::CursorInvisible => "civis",
            StringCap::CursorNormal => "cnorm",
            StringCap::CursorPositionRequest => "u7",
            StringCap::KeypadXmit => "smkx",
            StringCap::KeypadLocal => "rmkx",
            StringCap::OrigPair => "op",
            StringCap::OrigColors => "oc",
            StringCap::SetAnsiForeground => "setaf",
            StringCap::SetAnsiBackground => "setab",
            StringCap::ToStatusLine => "tsl",
            StringCap::FromStatusLine => "fsl",
            StringCap::KeyBackspace => "kbs",
            StringCap::KeyBackTab => "kcbt",
            StringCap::KeyClear => "kclr",
            StringCap::KeyDelete => "kdch1",
            StringCap::KeyDown => "kcud1",
            StringCap::KeyEnd => "kend",
            StringCap::KeyEnter => "kent",
            StringCap::KeyHome => "khome",
            StringCap::KeyInsert => "kich1",
            StringCap::KeyLeft => "kcub1",
            StringCap::KeyNextPage => "knp",
            StringCap::KeyPrevPage => "kpp",
            StringCap::KeyRight => "kcuf1",
            StringCap::KeyUp => "kcuu1",
            StringCap::KeyFunction(n) => return Cow::Owned(format!("kf{}", n)),
        };
        Cow::Borrowed(name)
    }
}

/// Numeric capabilities
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumberCap {
    Columns,
    Lines,
    MaxColors,
}

impl NumberCap {
    /// Terminfo short name
    pub fn name(self) -> &'static str {
        match self {
            NumberCap::Columns => "cols",
            NumberCap::Lines => "lines",
            NumberCap::MaxColors => "colors",
        }
    }
}
