//! Session provider seam.
//!
//! The provider owns authentication and message transport. The bridge only
//! sees the lifecycle events it emits through an [`EventSink`] and the
//! `send` operation it exposes. A new provider instance is created through a
//! [`ProviderFactory`] every time the state machine (re)starts the session.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::ProviderResult;
use crate::event::{MachineInput, SessionEvent};

/// Domain appended to bare identifiers when the provider does not say otherwise.
pub const DEFAULT_ADDRESS_SUFFIX: &str = "c.us";

/// A live messaging session.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Sends `body` to the fully qualified `address`.
    async fn send(&self, address: &str, body: &str) -> ProviderResult<()>;

    /// Domain appended to bare target identifiers.
    fn address_suffix(&self) -> &str {
        DEFAULT_ADDRESS_SUFFIX
    }

    /// Releases the session. Called when the instance is superseded or the
    /// bridge shuts down.
    async fn shutdown(&self) {}
}

/// Shared provider instance.
pub type BoxedProvider = Arc<dyn SessionProvider>;

/// Creates provider instances.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    /// Constructs a provider that reports its events into `events`.
    ///
    /// An error here is a provider initialization failure: the state machine
    /// moves to `Failed` and retries later.
    async fn create(&self, events: EventSink) -> ProviderResult<BoxedProvider>;
}

/// Shared provider factory.
pub type BoxedProviderFactory = Arc<dyn ProviderFactory>;

/// An input queued for the supervisor.
///
/// Provider events carry the generation of the instance that produced them so
/// events from a superseded instance can be dropped.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Generation of the emitting provider, `None` for internal inputs.
    pub generation: Option<u64>,
    /// The input itself.
    pub input: MachineInput,
}

impl Envelope {
    /// Wraps an internal input.
    pub fn internal(input: MachineInput) -> Self {
        Self {
            generation: None,
            input,
        }
    }
}

/// Where a provider instance reports its lifecycle events.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EventSink {
    /// Creates a sink bound to a provider generation.
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { generation, tx }
    }

    /// Generation of the provider instance this sink belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reports an event. Returns `false` once the supervisor is gone.
    pub fn emit(&self, event: SessionEvent) -> bool {
        trace!(generation = self.generation, event = event.name(), "Provider event");
        self.tx
            .send(Envelope {
                generation: Some(self.generation),
                input: MachineInput::Session(event),
            })
            .is_ok()
    }

    /// Whether the supervisor is still listening.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Holds the current provider instance, if any.
#[derive(Clone, Default)]
pub struct ProviderSlot {
    inner: Arc<RwLock<Option<(u64, BoxedProvider)>>>,
}

impl ProviderSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current provider.
    pub fn get(&self) -> Option<BoxedProvider> {
        self.inner.read().as_ref().map(|(_, p)| Arc::clone(p))
    }

    /// Generation of the current provider.
    pub fn generation(&self) -> Option<u64> {
        self.inner.read().as_ref().map(|(g, _)| *g)
    }

    /// Installs a provider, returning the one it replaced.
    pub(crate) fn replace(&self, generation: u64, provider: BoxedProvider) -> Option<BoxedProvider> {
        self.inner
            .write()
            .replace((generation, provider))
            .map(|(_, p)| p)
    }

    /// Empties the slot, returning the previous provider.
    pub(crate) fn take(&self) -> Option<BoxedProvider> {
        self.inner.write().take().map(|(_, p)| p)
    }
}

impl std::fmt::Debug for ProviderSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSlot")
            .field("generation", &self.generation())
            .finish()
    }
}
