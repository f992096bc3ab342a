//! # wabridge Core
//!
//! Connection lifecycle and services of the wabridge messaging bridge.
//!
//! The bridge drives an external messaging session (the *provider*), tracks
//! its authentication and connection state, restarts it when it drops and
//! relays inbound messages to a webhook. This crate holds everything that
//! does not touch the network:
//!
//! - **State**: [`ConnectionState`], [`Phase`] and the shared [`StateCell`]
//! - **State machine**: the pure [`machine::apply`] transition function
//! - **Supervisor**: [`ConnectionSupervisor`], the single writer that executes
//!   transition effects (start provider, schedule retry, relay)
//! - **Seams**: [`SessionProvider`], [`ProviderFactory`] and [`Relay`]
//! - **Services**: [`MessageDispatchService`] and [`StatusQueryService`]
//!
//! ```text
//! ┌──────────┐  EventSink   ┌────────────┐  Relay effect  ┌───────────┐
//! │ Provider │─────────────▶│ Supervisor │───────────────▶│  Webhook  │
//! └──────────┘              └────────────┘                └───────────┘
//!      ▲                           │ publish
//!      │ send                      ▼
//! ┌──────────┐               ┌───────────┐
//! │ Dispatch │──── reads ───▶│ StateCell │◀─── Status
//! └──────────┘               └───────────┘
//! ```

pub mod dispatch;
pub mod error;
pub mod event;
pub mod machine;
pub mod provider;
pub mod relay;
pub mod scheduler;
pub mod state;
pub mod status;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::{Ack, MessageDispatchService, OutboundMessageRequest, normalize_target};
pub use error::{DispatchError, DispatchResult, ProviderError, ProviderResult};
pub use event::{InboundMessage, MachineInput, SessionEvent};
pub use machine::{Effect, RetryPolicy, Transition};
pub use provider::{
    BoxedProvider, BoxedProviderFactory, DEFAULT_ADDRESS_SUFFIX, Envelope, EventSink,
    ProviderFactory, ProviderSlot, SessionProvider,
};
pub use relay::{DisabledRelay, Relay, RelayPayload};
pub use scheduler::RetryScheduler;
pub use state::{ConnectionState, Phase, StateCell};
pub use status::{StatusQueryService, StatusSnapshot};
pub use supervisor::{ConnectionSupervisor, SupervisorHandle};
