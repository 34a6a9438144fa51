//! Error types for termwire.

use std::fmt;
use std::io;

/// Result type alias for termwire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for termwire operations.
#[derive(Debug)]
pub enum Error {
    /// I/O error from console reads or writes.
    Io(io::Error),
    /// A pending (one-shot) expectation already exists for this terminator.
    DuplicateExpectation { terminator: String },
    /// Operation not allowed in the coordinator's current lifecycle state.
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    /// The input reader thread failed or panicked.
    ReaderFailed(String),
    /// The input reader did not signal readiness in time.
    ReaderNotReady,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::DuplicateExpectation { terminator } => {
                write!(
                    f,
                    "a response with terminator {terminator:?} is already expected"
                )
            }
            Self::InvalidState { operation, state } => {
                write!(f, "cannot {operation} while the loop is {state}")
            }
            Self::ReaderFailed(msg) => write!(f, "input reader failed: {msg}"),
            Self::ReaderNotReady => write!(f, "input reader did not become ready"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
