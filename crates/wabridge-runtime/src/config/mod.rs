//! Configuration of the bridge.
//!
//! [`ConfigLoader`] layers defaults, config files, environment variables and
//! command-line overrides into a [`BridgeConfig`], then checks it with
//! [`validate_config`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, PROFILE_ENV, Profile};
pub use schema::{
    BridgeConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, RetryConfig, ServerConfig,
    SessionConfig, SpanEventConfig, WebhookConfig,
};
pub use validation::validate_config;
