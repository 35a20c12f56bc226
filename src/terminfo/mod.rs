//! Terminal capability sources.
//!
//! - **caps**: typed capability identifiers and their terminfo short names
//! - **database**: the `CapabilityDatabase` interface and built-in descriptions
//! - **param**: parameterized string (`%p1%d`) evaluation
//!
//! # Data Flow
//!
//! ```text
//! TERM ──> TermDescription ──(get_string/get_number)──> CapabilityRegistry
//!                                                          │
//!                         template + args ──> param::evaluate ──> escape bytes
//! ```

pub mod caps;
pub mod database;
pub mod param;

pub use caps::{NumberCap, StringCap, MAX_FUNCTION_KEY};
pub use database::{CapabilityDatabase, TermDescription};
pub use param::{evaluate, Param, ParamError};
