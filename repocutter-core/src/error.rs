//! Error taxonomy for dump-stream surgery
//!
//! There is no recovery path anywhere in the engine: the stream is either
//! parseable or the run dies. The CLI maps every variant to a single
//! "croaking" line on stderr and exit code 1.

use std::io;

/// Result type for stream operations
pub type Result<T> = std::result::Result<T, DumpError>;

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    /// The input violates the dump format
    #[error("malformed stream near line {line} (revision {revision}): {message}")]
    Malformed {
        line: u64,
        revision: u64,
        message: String,
    },

    /// A flag or positional argument cannot be used as given
    #[error("illegal argument: {0}")]
    Argument(String),

    /// The requested operation is forbidden on this stream
    #[error("{0}")]
    Conflict(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DumpError {
    pub fn malformed(line: u64, revision: u64, message: impl Into<String>) -> Self {
        DumpError::Malformed {
            line,
            revision,
            message: message.into(),
        }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        DumpError::Argument(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        DumpError::Conflict(message.into())
    }
}
