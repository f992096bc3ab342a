//! In-memory fakes shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{ProviderError, ProviderResult};
use crate::event::{InboundMessage, SessionEvent};
use crate::machine::RetryPolicy;
use crate::provider::{BoxedProvider, BoxedProviderFactory, EventSink, ProviderFactory, SessionProvider};
use crate::relay::{Relay, RelayPayload};
use crate::state::Phase;
use crate::supervisor::{ConnectionSupervisor, SupervisorHandle};

#[derive(Default)]
pub struct FakeProvider {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
    pub shutdowns: Arc<AtomicUsize>,
    pub fail_send: Arc<AtomicBool>,
}

#[async_trait]
impl SessionProvider for FakeProvider {
    async fn send(&self, address: &str, body: &str) -> ProviderResult<()> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(ProviderError::send_failed("chat not found"));
        }
        self.sent.lock().push((address.to_string(), body.to_string()));
        Ok(())
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeFactory {
    pub sinks: Mutex<Vec<EventSink>>,
    pub fail: AtomicBool,
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
    pub shutdowns: Arc<AtomicUsize>,
    pub fail_send: Arc<AtomicBool>,
}

impl FakeFactory {
    pub fn created(&self) -> usize {
        self.sinks.lock().len()
    }

    pub fn sink(&self, index: usize) -> EventSink {
        self.sinks.lock()[index].clone()
    }

    pub fn latest(&self) -> EventSink {
        self.sinks.lock().last().cloned().unwrap()
    }
}

#[async_trait]
impl ProviderFactory for FakeFactory {
    async fn create(&self, events: EventSink) -> ProviderResult<BoxedProvider> {
        self.sinks.lock().push(events);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::init("browser not found"));
        }
        Ok(Arc::new(FakeProvider {
            sent: Arc::clone(&self.sent),
            shutdowns: Arc::clone(&self.shutdowns),
            fail_send: Arc::clone(&self.fail_send),
        }))
    }
}

#[derive(Default)]
pub struct RecordingRelay {
    pub seen: Mutex<Vec<String>>,
    pub panic_on_first: AtomicBool,
}

impl Relay for RecordingRelay {
    fn relay(&self, payload: RelayPayload) {
        self.seen.lock().push(payload.body);
        if self.panic_on_first.swap(false, Ordering::SeqCst) {
            panic!("webhook exploded");
        }
    }

    fn is_configured(&self) -> bool {
        true
    }
}

pub struct Harness {
    pub factory: Arc<FakeFactory>,
    pub relay: Arc<RecordingRelay>,
    pub handle: SupervisorHandle,
    pub cancel: CancellationToken,
}

impl Harness {
    pub async fn start(factory: FakeFactory, relay: RecordingRelay) -> Self {
        let factory = Arc::new(factory);
        let relay = Arc::new(relay);
        let supervisor = ConnectionSupervisor::new(
            Arc::clone(&factory) as BoxedProviderFactory,
            Arc::clone(&relay) as Arc<dyn Relay>,
            RetryPolicy::default(),
        );
        let handle = supervisor.handle();
        let cancel = CancellationToken::new();
        supervisor.spawn(cancel.clone());
        settle().await;
        Self {
            factory,
            relay,
            handle,
            cancel,
        }
    }

    pub async fn started() -> Self {
        Self::start(FakeFactory::default(), RecordingRelay::default()).await
    }

    pub fn phase(&self) -> Phase {
        self.handle.state().phase
    }

    pub async fn emit(&self, event: SessionEvent) {
        self.factory.latest().emit(event);
        settle().await;
    }

    pub async fn make_ready(&self) {
        self.emit(SessionEvent::Authenticated).await;
        self.emit(SessionEvent::Ready).await;
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Lets spawned tasks run without letting a paused clock auto-advance.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

pub async fn advance(secs: u64) {
    tokio::time::advance(Duration::from_secs(secs)).await;
    settle().await;
}

pub fn message(body: &str) -> SessionEvent {
    SessionEvent::MessageReceived(InboundMessage {
        from: "15551234567@c.us".into(),
        body: body.into(),
        timestamp: 1_700_000_000,
        message_type: "chat".into(),
    })
}
