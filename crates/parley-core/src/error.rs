//! Error types for parley-core

use std::time::Duration;

use thiserror::Error;

/// Result type alias using parley-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the execution bridge
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Bad user input, reported synchronously with no task created
    #[error("{0}")]
    InvalidCommand(String),

    /// The provider call failed
    #[error("API error: {0}")]
    ExternalCall(String),

    /// The local time budget ran out before the operation finished
    #[error("Request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The user cancelled the operation
    #[error("Cancelled")]
    Cancelled,

    /// A task lifecycle contract was violated
    #[error("Invalid task state: {0}")]
    InvalidState(String),
}

/// Discriminant of [`Error`], for matching without the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidCommand,
    ExternalCall,
    Timeout,
    Cancelled,
    InvalidState,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidCommand(_) => ErrorKind::InvalidCommand,
            Error::ExternalCall(_) => ErrorKind::ExternalCall,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::InvalidState(_) => ErrorKind::InvalidState,
        }
    }

    /// Whether this error is a programming error rather than a runtime condition
    pub fn is_bug(&self) -> bool {
        self.kind() == ErrorKind::InvalidState
    }
}

impl From<parley_ai::Error> for Error {
    fn from(e: parley_ai::Error) -> Self {
        Error::ExternalCall(e.provider_message())
    }
}
