//! Error types
//!
//! `ParseError` covers precondition failures that are raised to the caller
//! before any engine contact. `EngineError` is what an engine reports about
//! the document itself; the orchestrators absorb it.

use std::path::PathBuf;

/// Precondition failure of a parse call
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("No such file or directory: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Is a directory: {}", .0.display())]
    IsADirectory(PathBuf),

    #[error("Data cannot be empty")]
    EmptyInput,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by an engine session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Malformed markup in strict mode
    #[error("{message} at line {line}, column {column}")]
    Malformed {
        line: u32,
        column: u32,
        message: String,
    },

    /// The session already saw end of input
    #[error("Parser session is already finished")]
    Finished,

    /// The session halted after a fatal error
    #[error("Parser session stopped after a fatal error")]
    Stopped,

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),
}

impl EngineError {
    /// Whether this failure came from the document content
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}
