//! Transport error types.

use thiserror::Error;

/// Errors raised by the network transports.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The webhook request never produced a response.
    #[error("webhook delivery failed: {0}")]
    Delivery(String),

    /// The webhook answered with a non-success status.
    #[error("webhook returned HTTP {code}: {body}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Binding a listening socket failed.
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// The address that could not be bound.
        addr: String,
        /// Reason for failure.
        reason: String,
    },

    /// Connecting to a remote endpoint failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Invalid transport configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
