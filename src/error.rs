//! Console error types

use std::io;
use thiserror::Error;

use crate::terminfo::ParamError;

#[derive(Error, Debug)]
pub enum ConsoleError {
    /// The terminal lacks the capability, or the platform cannot express the request
    #[error("Operation is not supported on this platform: {0}")]
    Unsupported(&'static str),

    #[error("Invalid console color value: {0}")]
    InvalidColor(i32),

    #[error("Terminal I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to evaluate capability string: {0}")]
    Param(#[from] ParamError),
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
