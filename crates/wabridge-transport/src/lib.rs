//! # wabridge Transport
//!
//! Network pieces of the wabridge bridge, each behind a feature flag:
//!
//! - `webhook`: [`WebhookRelay`], the reqwest based [`Relay`](wabridge_core::Relay)
//! - `http-server`: the axum HTTP surface (`/status`, `/send`, `/health`,
//!   `/qr`, `/test`)
//! - `ws-session`: [`WsSessionFactory`], a session provider that talks to a
//!   messaging client sidecar over WebSocket
//! - `full` (default): all of the above
//!
//! ```text
//! ┌─────────────────────┐
//! │  wabridge-runtime   │  (wiring, config)
//! ├─────────────────────┤
//! │  wabridge-transport │  <- This crate
//! ├─────────────────────┤
//! │  wabridge-core      │  (state machine, seams)
//! └─────────────────────┘
//! ```

pub mod error;

#[cfg(feature = "http-server")]
pub mod http;

#[cfg(feature = "ws-session")]
pub mod session;

#[cfg(feature = "webhook")]
pub mod webhook;

pub use error::{TransportError, TransportResult};

#[cfg(feature = "http-server")]
pub use http::{AppState, HttpServer, router};

#[cfg(feature = "ws-session")]
pub use session::{WsSessionConfig, WsSessionFactory, WsSessionProvider};

#[cfg(feature = "webhook")]
pub use webhook::{PLACEHOLDER_WEBHOOK_URL, WebhookConfig, WebhookRelay};
