//! Errors raised by host collaborators.

use keel_common::Cancelled;
use thiserror::Error;

/// A failure reported by the filesystem or parse collaborator.
///
/// I/O failures never abort construction: callers turn them into
/// diagnostics and treat the file as missing. Cancellation is propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// Reading a path failed for a reason other than absence.
    #[error("cannot read '{path}': {message}")]
    Io {
        /// The path that could not be read.
        path: String,
        /// The underlying error message.
        message: String,
    },
    /// The host requested cancellation.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl HostError {
    /// Creates an I/O error for `path`.
    pub fn io(path: impl Into<String>, message: impl Into<String>) -> Self {
        HostError::Io {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = HostError::io("/a.ts", "permission denied");
        assert_eq!(err.to_string(), "cannot read '/a.ts': permission denied");
        assert_eq!(HostError::from(Cancelled).to_string(), "operation cancelled");
    }
}
