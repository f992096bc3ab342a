//! # wabridge
//!
//! Keeps a WhatsApp Web session alive, relays inbound messages to an HTTP
//! webhook (typically an n8n workflow) and exposes a small HTTP API to send
//! messages and inspect the connection.
//!
//! - [`wabridge_core`]: connection state machine, supervisor and services
//! - [`wabridge_transport`]: webhook relay, HTTP surface, WebSocket session provider
//! - [`wabridge_runtime`]: configuration, logging and orchestration
//!
//! ```rust,ignore
//! use wabridge::BridgeRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     BridgeRuntime::builder().profile("production").build()?.run().await?;
//!     Ok(())
//! }
//! ```

pub use wabridge_core;
pub use wabridge_runtime;
pub use wabridge_transport;

pub use wabridge_core::{
    ConnectionState, ConnectionSupervisor, MessageDispatchService, Phase, ProviderFactory,
    SessionEvent, SessionProvider, StatusQueryService, SupervisorHandle,
};
pub use wabridge_runtime::{BridgeConfig, BridgeRuntime, ConfigLoader, RuntimeBuilder};

pub mod prelude {
    pub use wabridge_core::{
        BoxedProvider, EventSink, InboundMessage, ProviderError, ProviderResult, SessionEvent,
        SessionProvider,
    };
    pub use wabridge_runtime::prelude::*;
    pub use wabridge_runtime::{BridgeConfig, BridgeRuntime};
}
