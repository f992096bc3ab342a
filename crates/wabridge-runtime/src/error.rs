//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use wabridge_transport::TransportError;

/// Errors that can occur while starting or running the bridge.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A transport could not be set up or failed while serving.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A background task ended abnormally.
    #[error("{task} task failed: {reason}")]
    Task { task: &'static str, reason: String },
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
