//! Core console control components.
//!
//! This module contains the capability-driven control logic:
//!
//! - **caps**: One-time capability resolution and key table construction
//! - **keys**: Key identities, modifiers and the longest-prefix key matcher
//! - **color**: Foreground/background tracking and the color escape cache
//! - **cursor**: Cursor position request/report exchange
//! - **writer**: Serialized escape-sequence output
//! - **input**: Buffered keyboard input under the input lock
//! - **io**: Raw terminal I/O seam (`TerminalIo`)
//! - **signal**: Break (SIGINT/SIGQUIT) notification
//!
//! # Architecture
//!
//! ```text
//! Console
//! ├── CapabilityRegistry ── CapabilitySet (templates + KeyTable)
//! ├── ColorStateTracker ─── AnsiStringCache
//! ├── AnsiWriter (output lock) ──┐
//! ├── InputReader (input lock) ──┼── TerminalIo
//! └── cursor::query_position ────┘
//! ```
//!
//! # Lock Order
//!
//! The input lock may be held while taking the output lock (the cursor
//! query writes its request that way). The reverse never happens.

pub mod caps;
pub mod color;
pub mod cursor;
pub mod input;
pub mod io;
pub mod keys;
#[cfg(unix)]
pub mod signal;
pub mod writer;
