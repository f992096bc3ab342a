//! Error types for the wabridge core.
//!
//! Each concern gets its own enum: the session provider, outbound dispatch.
//! None of them is fatal to the process; the supervisor turns provider
//! construction failures into a scheduled retry and records everything else
//! into the connection status.

use thiserror::Error;

// =============================================================================
// Provider Errors
// =============================================================================

/// Errors reported by a [`SessionProvider`](crate::SessionProvider) or its factory.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider instance could not be constructed.
    #[error("provider initialization failed: {0}")]
    Init(String),

    /// The provider has no live session to send through.
    #[error("provider is not connected")]
    NotConnected,

    /// The provider accepted the request but the send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The provider did not answer in time.
    #[error("provider request timed out")]
    Timeout,

    /// The provider spoke something we could not understand.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ProviderError {
    /// Creates an initialization error.
    pub fn init(reason: impl Into<String>) -> Self {
        Self::Init(reason.into())
    }

    /// Creates a send failure.
    pub fn send_failed(reason: impl Into<String>) -> Self {
        Self::SendFailed(reason.into())
    }
}

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Errors returned by [`MessageDispatchService::send`](crate::MessageDispatchService::send).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The connection is not in the `Ready` phase.
    #[error("bot not ready: {status}")]
    NotReady {
        /// Status message at the time of the request.
        status: String,
    },

    /// Target or body missing.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The provider rejected or failed the send.
    #[error("provider failure: {0}")]
    ProviderFailure(String),
}

impl From<ProviderError> for DispatchError {
    fn from(err: ProviderError) -> Self {
        Self::ProviderFailure(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
