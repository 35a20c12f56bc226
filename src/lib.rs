//! termpal - terminal-capability-driven console control
//!
//! termpal turns abstract console operations (colors, cursor movement,
//! clearing, titles, key reads) into the escape sequences the attached
//! terminal understands, and turns the terminal's input bytes back into
//! keys.
//!
//! # Features
//!
//! - **Capability resolution**: built-in terminal descriptions plus
//!   configurable overrides, resolved once per console
//! - **Key recognition**: longest-prefix matching over function, navigation
//!   and modifier-qualified key sequences
//! - **Colors**: 16 console colors mapped onto 8/16/256-color terminals
//! - **Cursor position**: request/report exchange on the shared input stream
//! - **Redirection aware**: escape sequences are dropped when output is not
//!   a terminal
//!
//! # Example
//!
//! ```no_run
//! use termpal::{Config, Console, ConsoleColor};
//!
//! # fn main() -> termpal::Result<()> {
//! let console = Console::open(&Config::load());
//! console.set_foreground_color(ConsoleColor::Green)?;
//! console.write("ready\n")?;
//! console.reset_color()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod console;
pub mod core;
pub mod error;
pub mod terminfo;

pub use crate::config::Config;
pub use crate::console::Console;
pub use crate::core::color::{ColorChannel, ConsoleColor};
pub use crate::core::io::{TerminalIo, WindowSize};
pub use crate::core::keys::{ConsoleKey, KeyInfo, Modifiers};
#[cfg(unix)]
pub use crate::core::signal::BreakSignal;
pub use crate::error::{ConsoleError, Result};
