//! Library error definitions.
//!
//! Only unrecoverable start-up failures are expressed through [`SimError`]:
//! malformed configuration files, malformed trace lines, and the I/O errors
//! underneath them. Run-time refusals are not errors at all. A full queue
//! surfaces as a rejected send that the caller retries on a later tick, and
//! a completion blocked by a full write-back buffer reports `false` so the
//! hierarchy re-drives it. Internal contracts are enforced with
//! `debug_assert!` at the point of violation.

use thiserror::Error;

/// Fatal simulator errors raised during bring-up.
#[derive(Debug, Error)]
pub enum SimError {
    /// A configuration line did not consist of exactly two tokens, or a
    /// recognized key carried a value that does not parse.
    #[error("{path}:{line}: malformed configuration line: {msg}")]
    ConfigParse {
        /// Configuration file the line came from.
        path: String,
        /// One-based line number.
        line: usize,
        /// Description of the malformation.
        msg: String,
    },

    /// A trace line could not be understood as a memory reference or a
    /// CPU instruction record.
    #[error("{path}:{line}: malformed trace line: {msg}")]
    TraceFormat {
        /// Trace file the line came from.
        path: String,
        /// One-based line number.
        line: usize,
        /// Description of the malformation.
        msg: String,
    },

    /// An underlying file could not be opened or read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Builds a [`SimError::ConfigParse`] without the call-site noise.
    pub fn config(path: &str, line: usize, msg: impl Into<String>) -> Self {
        Self::ConfigParse {
            path: path.to_string(),
            line,
            msg: msg.into(),
        }
    }

    /// Builds a [`SimError::TraceFormat`] without the call-site noise.
    pub fn trace(path: &str, line: usize, msg: impl Into<String>) -> Self {
        Self::TraceFormat {
            path: path.to_string(),
            line,
            msg: msg.into(),
        }
    }
}
