//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use wabridge_core::{DEFAULT_ADDRESS_SUFFIX, RetryPolicy};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// HTTP surface.
    pub server: ServerConfig,
    /// Outbound relay of inbound messages.
    pub webhook: WebhookConfig,
    /// Recovery delays of the connection supervisor.
    pub retry: RetryConfig,
    /// Session sidecar connection.
    pub session: SessionConfig,
    /// Logging setup.
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// The `host:port` pair handed to the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Webhook relay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Target URL. Absent, empty or the sample placeholder disables relaying.
    #[serde(default)]
    pub url: Option<String>,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum concurrent deliveries.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_webhook_timeout_ms(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl WebhookConfig {
    /// Converts to the relay's own settings.
    pub fn to_transport(&self) -> wabridge_transport::WebhookConfig {
        wabridge_transport::WebhookConfig {
            url: self.url.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            max_in_flight: self.max_in_flight,
        }
    }
}

fn default_webhook_timeout_ms() -> u64 {
    10_000
}

fn default_max_in_flight() -> usize {
    16
}

/// Recovery delays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Seconds to wait before reconnecting after a disconnect.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Seconds to wait before re-initializing after a failed start.
    #[serde(default = "default_reinit_delay_secs")]
    pub reinit_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: default_reconnect_delay_secs(),
            reinit_delay_secs: default_reinit_delay_secs(),
        }
    }
}

impl RetryConfig {
    /// Converts to the supervisor's retry policy.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            reconnect_delay: Duration::from_secs(self.reconnect_delay_secs),
            reinit_delay: Duration::from_secs(self.reinit_delay_secs),
        }
    }
}

fn default_reconnect_delay_secs() -> u64 {
    30
}

fn default_reinit_delay_secs() -> u64 {
    60
}

/// Session sidecar configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sidecar WebSocket endpoint.
    #[serde(default = "default_session_url")]
    pub url: String,

    /// Send timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Domain appended to bare recipient identifiers.
    #[serde(default = "default_address_suffix")]
    pub address_suffix: String,

    /// Optional session label.
    #[serde(default)]
    pub client_name: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: default_session_url(),
            request_timeout_ms: default_request_timeout_ms(),
            address_suffix: default_address_suffix(),
            client_name: None,
        }
    }
}

impl SessionConfig {
    /// Converts to the WebSocket provider settings.
    pub fn to_transport(&self) -> wabridge_transport::WsSessionConfig {
        wabridge_transport::WsSessionConfig {
            url: self.url.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            address_suffix: self.address_suffix.clone(),
            client_name: self.client_name.clone(),
        }
    }
}

fn default_session_url() -> String {
    "ws://127.0.0.1:7000/session".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_address_suffix() -> String {
    DEFAULT_ADDRESS_SUFFIX.to_string()
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the level as a filter directive string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to the `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line format of the log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level, overridden by `RUST_LOG`.
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Log file, required when `output = "file"`.
    pub file_path: Option<PathBuf>,
    /// Per-module levels, e.g. `wabridge_transport = "debug"`.
    pub filters: BTreeMap<String, LogLevel>,
    pub span_events: SpanEventConfig,
    pub thread_ids: bool,
    /// Include file and line of each event.
    pub file_location: bool,
}
