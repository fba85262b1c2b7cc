//! Centralized error types for mailgrab.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailgrab library.
#[derive(Error, Debug)]
pub enum GrabError {
    /// Credentials could not be loaded, refreshed or obtained.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A call to the mail API failed.
    #[error("{operation} failed: {reason}")]
    Transport {
        operation: String,
        reason: String,
        /// `true` when retrying the same call may succeed (timeouts, 5xx, 429).
        transient: bool,
    },

    /// The part tree of a message nests deeper than the walker allows.
    #[error("Part tree of message {message_id} exceeds the depth limit of {depth}")]
    StructuralLimitExceeded { message_id: String, depth: usize },

    /// An attachment payload is not valid in the API's transfer encoding.
    #[error("Could not decode {context}: {reason}")]
    Decode { context: String, reason: String },

    /// The API answered with JSON we cannot interpret.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// An attachment filename that cannot be used inside the target directory.
    #[error("Unusable attachment filename '{0}'")]
    InvalidFilename(String),

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, GrabError>`.
pub type Result<T> = std::result::Result<T, GrabError>;

impl GrabError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Transport` variant.
    pub fn transport(operation: impl Into<String>, reason: impl ToString, transient: bool) -> Self {
        Self::Transport {
            operation: operation.into(),
            reason: reason.to_string(),
            transient,
        }
    }

    /// Create a `Decode` variant.
    pub fn decode(context: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the failed call might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { transient: true, .. })
    }

    /// Whether this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GrabError::transport("search", "503", true).is_transient());
        assert!(!GrabError::transport("search", "404", false).is_transient());
        assert!(!GrabError::Auth("expired".into()).is_transient());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(GrabError::Auth("nope".into()).is_fatal());
        assert!(!GrabError::decode("a.txt", "bad byte").is_fatal());
    }

    #[test]
    fn test_display_carries_context() {
        let e = GrabError::StructuralLimitExceeded {
            message_id: "18c2f".into(),
            depth: 64,
        };
        assert!(e.to_string().contains("18c2f"));
        assert!(e.to_string().contains("64"));
    }
}
