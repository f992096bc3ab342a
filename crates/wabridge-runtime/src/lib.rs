//! wabridge Runtime - orchestration layer of the wabridge messaging bridge.
//!
//! This crate provides:
//! - Layered configuration loading and validation (`ConfigLoader`, `BridgeConfig`)
//! - Logging built from configuration (`LoggingBuilder`)
//! - Runtime orchestration (`BridgeRuntime`)
//!
//! ```ignore
//! use wabridge_runtime::BridgeRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     BridgeRuntime::builder().build()?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
mod fault;
pub mod logging;
pub mod runtime;

pub use config::{BridgeConfig, ConfigError, ConfigLoader, ConfigResult, Profile};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{BridgeRuntime, RunningBridge, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
