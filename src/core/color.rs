//! Foreground/background color tracking
//!
//! The tracker remembers the selected color per channel and turns a change
//! into escape output. Every change re-emits the full state: reset first,
//! then the foreground and background that are set. Terminals disagree on
//! whether setting one channel disturbs the other, so only the full sequence
//! gives the same result everywhere.
//!
//! Evaluated color escapes are cached per channel and color. Each slot is a
//! `OnceLock`, so threads that hit an empty slot together wait for a single
//! evaluation instead of each filling it. A racy fill would write the same
//! bytes; the lock only removes the duplicate work.

use std::sync::atomic::{AtomicI8, Ordering};
use std::sync::OnceLock;

use tracing::warn;

use super::caps::CapabilitySet;
use super::writer::AnsiWriter;
use crate::error::{ConsoleError, Result};
use crate::terminfo::{self, Param};

/// Sentinel for a channel with no color selected
const UNSET: i8 = -1;

/// Console color to ANSI color index
const ANSI_CODES: [i32; 16] = [0, 4, 2, 6, 1, 5, 3, 7, 8, 12, 10, 14, 9, 13, 11, 15];

/// The 16 console colors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConsoleColor {
    Black = 0,
    DarkBlue,
    DarkGreen,
    DarkCyan,
    DarkRed,
    DarkMagenta,
    DarkYellow,
    Gray,
    DarkGray,
    Blue,
    Green,
    Cyan,
    Red,
    Magenta,
    Yellow,
    White,
}

impl ConsoleColor {
    pub const ALL: [ConsoleColor; 16] = [
        ConsoleColor::Black,
        ConsoleColor::DarkBlue,
        ConsoleColor::DarkGreen,
        ConsoleColor::DarkCyan,
        ConsoleColor::DarkRed,
        ConsoleColor::DarkMagenta,
        ConsoleColor::DarkYellow,
        ConsoleColor::Gray,
        ConsoleColor::DarkGray,
        ConsoleColor::Blue,
        ConsoleColor::Green,
        ConsoleColor::Cyan,
        ConsoleColor::Red,
        ConsoleColor::Magenta,
        ConsoleColor::Yellow,
        ConsoleColor::White,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// ANSI palette index for this color
    pub fn ansi_code(self) -> i32 {
        ANSI_CODES[self.index()]
    }
}

impl TryFrom<i32> for ConsoleColor {
    type Error = ConsoleError;

    fn try_from(value: i32) -> Result<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(ConsoleError::InvalidColor(value))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorChannel {
    Foreground,
    Background,
}

impl ColorChannel {
    fn index(self) -> usize {
        match self {
            ColorChannel::Foreground => 0,
            ColorChannel::Background => 1,
        }
    }
}

/// Evaluated color escapes per (channel, color).
///
/// Entries depend only on the capability set, so a filled slot never changes.
pub struct AnsiStringCache {
    entries: [[OnceLock<Option<String>>; 16]; 2],
}

impl Default for AnsiStringCache {
    fn default() -> Self {
        Self {
            entries: std::array::from_fn(|_| std::array::from_fn(|_| OnceLock::new())),
        }
    }
}

impl AnsiStringCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached escape for the pair, evaluating the channel's template on first use
    pub fn get(
        &self,
        caps: &CapabilitySet,
        channel: ColorChannel,
        color: ConsoleColor,
    ) -> Option<&str> {
        self.entries[channel.index()][color.index()]
            .get_or_init(|| evaluate_color(caps, channel, color))
            .as_deref()
    }

    pub fn is_cached(&self, channel: ColorChannel, color: ConsoleColor) -> bool {
        self.entries[channel.index()][color.index()].get().is_some()
    }
}

fn evaluate_color(caps: &CapabilitySet, channel: ColorChannel, color: ConsoleColor) -> Option<String> {
    let template = match channel {
        ColorChannel::Foreground => caps.foreground.as_deref(),
        ColorChannel::Background => caps.background.as_deref(),
    }?;
    if caps.max_colors <= 0 {
        return None;
    }

    let code = color.ansi_code() % caps.max_colors;
    match terminfo::evaluate(template, &[Param::Number(code)]) {
        Ok(seq) => Some(seq),
        Err(e) => {
            warn!("Cannot evaluate {:?} color template for {:?}: {}", channel, color, e);
            None
        }
    }
}

/// Current color selection plus the escape cache
pub struct ColorStateTracker {
    foreground: AtomicI8,
    background: AtomicI8,
    cache: AnsiStringCache,
}

impl Default for ColorStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorStateTracker {
    pub fn new() -> Self {
        Self {
            foreground: AtomicI8::new(UNSET),
            background: AtomicI8::new(UNSET),
            cache: AnsiStringCache::new(),
        }
    }

    fn slot(&self, channel: ColorChannel) -> &AtomicI8 {
        match channel {
            ColorChannel::Foreground => &self.foreground,
            ColorChannel::Background => &self.background,
        }
    }

    /// Tracked color, `None` when unset
    pub fn get(&self, channel: ColorChannel) -> Option<ConsoleColor> {
        let value = self.slot(channel).load(Ordering::SeqCst);
        ConsoleColor::try_from(i32::from(value)).ok()
    }

    /// Select a color (or clear it with `None`) and re-emit the color state
    pub fn set(
        &self,
        channel: ColorChannel,
        color: Option<ConsoleColor>,
        caps: &CapabilitySet,
        writer: &AnsiWriter,
    ) -> Result<()> {
        let out = writer.lock();
        let value = color.map_or(UNSET, |c| c.index() as i8);
        self.slot(channel).store(value, Ordering::SeqCst);

        if !writer.escapes_enabled() {
            return Ok(());
        }
        if let Some(reset) = &caps.reset {
            out.escape(reset)?;
        }
        for channel in [ColorChannel::Foreground, ColorChannel::Background] {
            if let Some(color) = self.get(channel) {
                if let Some(seq) = self.cache.get(caps, channel, color) {
                    out.escape(seq)?;
                }
            }
        }
        Ok(())
    }

    /// Select a color by raw value: `-1` clears, `0..=15` selects.
    ///
    /// Anything else is rejected before the tracked state changes.
    pub fn set_value(
        &self,
        channel: ColorChannel,
        value: i32,
        caps: &CapabilitySet,
        writer: &AnsiWriter,
    ) -> Result<()> {
        let color = if value == i32::from(UNSET) {
            None
        } else {
            Some(ConsoleColor::try_from(value)?)
        };
        self.set(channel, color, caps, writer)
    }

    /// Clear both channels and emit the reset sequence
    pub fn reset(&self, caps: &CapabilitySet, writer: &AnsiWriter) -> Result<()> {
        let out = writer.lock();
        self.foreground.store(UNSET, Ordering::SeqCst);
        self.background.store(UNSET, Ordering::SeqCst);
        if let Some(reset) = &caps.reset {
            out.escape(reset)?;
        }
        Ok(())
    }
}
