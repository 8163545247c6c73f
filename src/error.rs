//! Unified error types for the trajectory engine.
//!
//! Errors fall into three families: transport failures (the remote side could
//! not be reached or answered with something undecodable), declared remote
//! failures (the envelope decoded but reported `ok: false`), and local
//! precondition failures (an edit or action the engine refuses before any
//! network call). None of them mutate session state.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for trajectory operations.
#[derive(Error, Debug)]
pub enum TrajectoryError {
    /// Connection failure or a response body that is not a valid envelope.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The remote service decoded fine but reported a failure.
    #[error("remote error: {message}")]
    Remote { message: String },

    /// The envelope was well-formed but its payload had the wrong shape.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// An edit or action refused locally (approved subject, incomplete closure, ...).
    #[error("rejected: {message}")]
    Rejected { message: String },

    /// A subject id that is not part of the loaded record set.
    #[error("unknown subject: {subject_id}")]
    UnknownSubject { subject_id: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// I/O errors from config or log files.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A specialized Result type for trajectory operations.
pub type Result<T> = std::result::Result<T, TrajectoryError>;

impl TrajectoryError {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a declared remote failure.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Create a payload decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a local precondition failure.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Create an unknown subject error.
    pub fn unknown_subject(subject_id: impl Into<String>) -> Self {
        Self::UnknownSubject {
            subject_id: subject_id.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Whether re-issuing the same request could succeed.
    ///
    /// Remote-call failures leave the session untouched, so they are always
    /// safe to retry. Local rejections will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Remote { .. } | Self::Decode { .. }
        )
    }

    /// Whether the error was raised locally before any network call.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::UnknownSubject { .. })
    }
}

impl From<io::Error> for TrajectoryError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for TrajectoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for TrajectoryError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

/// Exit codes for the trajectory CLI.
pub mod exit_codes {
    /// The command completed.
    pub const SUCCESS: i32 = 0;

    /// A remote or configuration failure.
    pub const FAILURE: i32 = 1;

    /// A local precondition blocked the action (nothing to save, closure incomplete).
    pub const BLOCKED: i32 = 2;

    /// The process panicked.
    pub const CRASH: i32 = 3;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TrajectoryError::transport("connection refused");
        assert_eq!(err.to_string(), "transport error: connection refused");
    }

    #[test]
    fn test_remote_error_display() {
        let err = TrajectoryError::remote("API key invalida");
        assert_eq!(err.to_string(), "remote error: API key invalida");
    }

    #[test]
    fn test_rejected_error_display() {
        let err = TrajectoryError::rejected("subject M1 is already approved");
        assert!(err.to_string().starts_with("rejected:"));
    }

    #[test]
    fn test_unknown_subject_display() {
        let err = TrajectoryError::unknown_subject("MAT-9");
        assert_eq!(err.to_string(), "unknown subject: MAT-9");
    }

    #[test]
    fn test_storage_error_display() {
        let err = TrajectoryError::storage(
            "/tmp/config.toml",
            io::Error::new(io::ErrorKind::NotFound, "file not found"),
        );
        assert!(err.to_string().contains("/tmp/config.toml"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(TrajectoryError::transport("x").is_retryable());
        assert!(TrajectoryError::remote("x").is_retryable());
        assert!(TrajectoryError::decode("x").is_retryable());
        assert!(!TrajectoryError::rejected("x").is_retryable());
        assert!(!TrajectoryError::config("x").is_retryable());
    }

    #[test]
    fn test_local_classification() {
        assert!(TrajectoryError::rejected("x").is_local());
        assert!(TrajectoryError::unknown_subject("x").is_local());
        assert!(!TrajectoryError::transport("x").is_local());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: TrajectoryError = json_err.into();
        assert!(matches!(err, TrajectoryError::Decode { .. }));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: TrajectoryError = io_err.into();
        assert!(matches!(err, TrajectoryError::Storage { .. }));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_codes::SUCCESS, 0);
        assert_eq!(exit_codes::FAILURE, 1);
        assert_eq!(exit_codes::BLOCKED, 2);
        assert_eq!(exit_codes::CRASH, 3);
    }
}
