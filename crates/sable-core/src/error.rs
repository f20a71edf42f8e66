//! Error types for the Sable invocation layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Sable workspace.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait.
///
/// Most environmental failures (tool unreachable, malformed output, hung
/// subprocess) are absorbed by the invocation layer and never surface as
/// errors; the variants here cover the remaining cases plus internal
/// invariant violations.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum SableError {
    /// The caller passed a session id the store has never issued, or one
    /// that was evicted. This indicates a session lifecycle bug in the
    /// caller and is the only error `send_message` propagates.
    #[error("Unknown session: '{id}'")]
    UnknownSession { id: String },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure spawning or communicating with the external tool process
    #[error("Subprocess error: {0}")]
    Subprocess(String),

    /// Failure inside an interactive session (stderr fault, answer
    /// resolution failure, cancellation)
    #[error("Interactive session error: {0}")]
    Interaction(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SableError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates an UnknownSession error
    pub fn unknown_session(id: impl Into<String>) -> Self {
        Self::UnknownSession { id: id.into() }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Subprocess error
    pub fn subprocess(message: impl Into<String>) -> Self {
        Self::Subprocess(message.into())
    }

    /// Creates an Interaction error
    pub fn interaction(message: impl Into<String>) -> Self {
        Self::Interaction(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is an UnknownSession error
    pub fn is_unknown_session(&self) -> bool {
        matches!(self, Self::UnknownSession { .. })
    }

    /// Check if this is an IO error
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Check if this is a subprocess error
    pub fn is_subprocess(&self) -> bool {
        matches!(self, Self::Subprocess(_))
    }

    /// Check if this error came from the environment rather than a caller
    /// bug. Environmental errors are candidates for fallback handling;
    /// the rest should be reported.
    pub fn is_environmental(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Subprocess(_) | Self::Interaction(_)
        )
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for SableError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for SableError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SableError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from anyhow::Error (transitional, should be removed eventually)
impl From<anyhow::Error> for SableError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Conversion from String (for error messages)
impl From<String> for SableError {
    fn from(err: String) -> Self {
        Self::Internal(err)
    }
}

/// A type alias for `Result<T, SableError>`.
pub type Result<T> = std::result::Result<T, SableError>;
