//! Gateway error types
//!
//! One taxonomy shared by every backend, with transient/permanent
//! classification for retry decisions.

use thiserror::Error;

use crate::service::DirectoryBackend;

/// Error that can occur during a directory operation.
///
/// Backend client errors are never surfaced typed to callers; they ride
/// along as the boxed `source` of [`DirectoryError::OperationFailed`] or
/// [`DirectoryError::ConnectionFailed`]. A missing single-entity lookup is
/// `Ok(None)`, not an error.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Failed to establish a connection to the directory.
    ///
    /// Fatal for the current call only; the next call retries
    /// establishment.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connection establishment timed out.
    #[error("connection timeout after {timeout_secs} seconds")]
    ConnectionTimeout { timeout_secs: u64 },

    /// The presented credentials were rejected by the backend.
    ///
    /// Credential-validation paths convert this to `Ok(false)` or an
    /// authentication-failure outcome; it only escapes as an error from
    /// the service-account bind.
    #[error("authentication failed: invalid credentials")]
    InvalidCredentials,

    /// A backend fault during an operation (transport or protocol).
    #[error("operation failed: {message}")]
    OperationFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The backend fundamentally cannot perform this operation.
    ///
    /// Distinct from [`DirectoryError::OperationFailed`] so callers can
    /// branch on capability.
    #[error("{operation} is not supported by the {backend} backend")]
    NotSupported {
        operation: &'static str,
        backend: DirectoryBackend,
    },

    /// The operation was cancelled. Propagated as-is, never wrapped.
    #[error("operation cancelled")]
    Cancelled,

    /// Service configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl DirectoryError {
    /// Check if this error is transient and the operation may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DirectoryError::ConnectionFailed { .. } | DirectoryError::ConnectionTimeout { .. }
        )
    }

    /// Get a stable code for classification and metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            DirectoryError::ConnectionTimeout { .. } => "CONNECTION_TIMEOUT",
            DirectoryError::InvalidCredentials => "INVALID_CREDENTIALS",
            DirectoryError::OperationFailed { .. } => "OPERATION_FAILED",
            DirectoryError::NotSupported { .. } => "NOT_SUPPORTED",
            DirectoryError::Cancelled => "CANCELLED",
            DirectoryError::InvalidConfiguration { .. } => "INVALID_CONFIG",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with the backend cause attached.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        DirectoryError::OperationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation failed error with the backend cause attached.
    pub fn operation_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::OperationFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-supported error for the given operation and backend.
    pub fn not_supported(operation: &'static str, backend: DirectoryBackend) -> Self {
        DirectoryError::NotSupported { operation, backend }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        DirectoryError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
