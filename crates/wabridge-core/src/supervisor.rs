//! Effect executor around the state machine.
//!
//! The [`ConnectionSupervisor`] is the single writer of the connection state.
//! It drains one queue of inputs (provider events, retry timers, faults),
//! applies each through [`machine::apply`](crate::machine::apply), publishes
//! the result and carries out the requested effects:
//!
//! - `StartProvider` spawns the factory call; the outcome comes back through
//!   a second queue so the slot is only ever touched from this task.
//! - `ScheduleRetry` arms the [`RetryScheduler`].
//! - `Relay` hands the payload to the relay, which returns immediately.
//!
//! Nothing in here waits on the network.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::event::MachineInput;
use crate::machine::{self, Effect, RetryPolicy};
use crate::provider::{BoxedProvider, BoxedProviderFactory, Envelope, EventSink, ProviderSlot};
use crate::relay::{RelayPayload, Relay};
use crate::scheduler::RetryScheduler;
use crate::state::{ConnectionState, StateCell};

type Created = (u64, ProviderResult<BoxedProvider>);

/// Cloneable access to a running supervisor.
#[derive(Clone)]
pub struct SupervisorHandle {
    state: StateCell,
    slot: ProviderSlot,
    relay: Arc<dyn Relay>,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl SupervisorHandle {
    /// Latest published connection state.
    pub fn state(&self) -> Arc<ConnectionState> {
        self.state.load()
    }

    /// The shared state cell.
    pub fn state_cell(&self) -> &StateCell {
        &self.state
    }

    /// The current provider instance, if one is installed.
    pub fn provider(&self) -> Option<BoxedProvider> {
        self.slot.get()
    }

    /// Whether inbound messages are relayed anywhere.
    pub fn relay_configured(&self) -> bool {
        self.relay.is_configured()
    }

    /// Records an internal error into the status message.
    pub fn report_fault(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, "Fault reported");
        let _ = self
            .tx
            .send(Envelope::internal(MachineInput::Fault(reason)));
    }
}

impl std::fmt::Debug for SupervisorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorHandle")
            .field("phase", &self.state.load().phase)
            .field("slot", &self.slot)
            .finish()
    }
}

/// Owns the connection lifecycle.
pub struct ConnectionSupervisor {
    policy: RetryPolicy,
    factory: BoxedProviderFactory,
    relay: Arc<dyn Relay>,
    current: ConnectionState,
    state: StateCell,
    slot: ProviderSlot,
    tx: mpsc::UnboundedSender<Envelope>,
    rx: mpsc::UnboundedReceiver<Envelope>,
    created_tx: mpsc::UnboundedSender<Created>,
    created_rx: mpsc::UnboundedReceiver<Created>,
    scheduler: RetryScheduler,
}

impl ConnectionSupervisor {
    /// Creates a supervisor in the `Initializing` phase.
    pub fn new(factory: BoxedProviderFactory, relay: Arc<dyn Relay>, policy: RetryPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (created_tx, created_rx) = mpsc::unbounded_channel();
        let current = ConnectionState::initial();

        Self {
            policy,
            factory,
            relay,
            state: StateCell::new(current.clone()),
            current,
            slot: ProviderSlot::new(),
            scheduler: RetryScheduler::new(tx.clone()),
            tx,
            rx,
            created_tx,
            created_rx,
        }
    }

    /// Returns a handle for readers and fault reporters.
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            state: self.state.clone(),
            slot: self.slot.clone(),
            relay: Arc::clone(&self.relay),
            tx: self.tx.clone(),
        }
    }

    /// Spawns [`run`](Self::run) onto the runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Starts the first provider and processes inputs until cancelled.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            reconnect_delay = ?self.policy.reconnect_delay,
            reinit_delay = ?self.policy.reinit_delay,
            relay = self.relay.is_configured(),
            "Connection supervisor started"
        );
        self.start_provider(self.current.generation);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(envelope) = self.rx.recv() => self.on_envelope(envelope),
                Some((generation, result)) = self.created_rx.recv() => {
                    self.on_created(generation, result);
                }
            }
        }

        self.scheduler.cancel();
        if let Some(provider) = self.slot.take() {
            provider.shutdown().await;
        }
        info!("Connection supervisor stopped");
    }

    fn on_envelope(&mut self, envelope: Envelope) {
        if let Some(generation) = envelope.generation
            && generation != self.current.generation
        {
            debug!(
                generation,
                current = self.current.generation,
                input = envelope.input.name(),
                "Dropping event from superseded provider"
            );
            return;
        }
        self.apply(envelope.input);
    }

    fn on_created(&mut self, generation: u64, result: ProviderResult<BoxedProvider>) {
        let live = generation == self.current.generation && !self.current.phase.is_recovering();

        match result {
            Ok(provider) if live => {
                info!(generation, "Provider instance started");
                if let Some(old) = self.slot.replace(generation, provider) {
                    retire(old);
                }
            }
            Ok(provider) => {
                debug!(generation, "Discarding provider for superseded generation");
                retire(provider);
            }
            Err(e) if generation == self.current.generation => {
                error!(generation, error = %e, "Provider initialization failed");
                let reason = match e {
                    ProviderError::Init(reason) => reason,
                    other => other.to_string(),
                };
                self.apply(MachineInput::InitFailed(reason));
            }
            Err(e) => {
                debug!(generation, error = %e, "Ignoring failure of superseded provider");
            }
        }
    }

    fn apply(&mut self, input: MachineInput) {
        let transition = machine::apply(&self.current, input, &self.policy);
        if transition.ignored {
            return;
        }

        let entered_recovery =
            !self.current.phase.is_recovering() && transition.state.phase.is_recovering();
        self.current = transition.state;
        self.state.publish(self.current.clone());

        if entered_recovery && let Some(provider) = self.slot.take() {
            retire(provider);
        }

        for effect in transition.effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::StartProvider { generation } => self.start_provider(generation),
            Effect::ScheduleRetry { delay, generation } => {
                self.scheduler.schedule(delay, generation);
            }
            Effect::Relay(payload) => self.relay(payload),
        }
    }

    fn relay(&mut self, payload: RelayPayload) {
        let relay = Arc::clone(&self.relay);
        if catch_unwind(AssertUnwindSafe(|| relay.relay(payload))).is_err() {
            error!("Relay panicked while accepting a message");
            self.apply(MachineInput::Fault("relay panicked".to_string()));
        }
    }

    fn start_provider(&self, generation: u64) {
        info!(generation, "Starting provider instance");
        let sink = EventSink::new(generation, self.tx.clone());
        let factory = Arc::clone(&self.factory);
        let created = self.created_tx.clone();

        tokio::spawn(async move {
            let result = match tokio::spawn(async move { factory.create(sink).await }).await {
                Ok(result) => result,
                Err(e) => Err(ProviderError::init(format!(
                    "provider construction aborted: {e}"
                ))),
            };
            let _ = created.send((generation, result));
        });
    }
}

/// Shuts a provider down in the background.
fn retire(provider: BoxedProvider) {
    tokio::spawn(async move {
        provider.shutdown().await;
    });
}
