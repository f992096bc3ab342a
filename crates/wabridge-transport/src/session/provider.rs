//! WebSocket session provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use wabridge_core::{
    BoxedProvider, DEFAULT_ADDRESS_SUFFIX, EventSink, ProviderError, ProviderFactory,
    ProviderResult, SessionEvent, SessionProvider,
};

use super::protocol::{IncomingFrame, ResponseFrame, SendMessageRequest, parse_frame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;
type PendingCalls = Arc<Mutex<HashMap<u64, oneshot::Sender<ResponseFrame>>>>;

/// Header carrying [`WsSessionConfig::client_name`].
pub const CLIENT_NAME_HEADER: &str = "x-wabridge-client";

/// Connection settings for the session sidecar.
#[derive(Debug, Clone)]
pub struct WsSessionConfig {
    /// Sidecar endpoint (`ws://` or `wss://`).
    pub url: String,
    /// How long a send waits for its response frame.
    pub request_timeout: Duration,
    /// Domain appended to bare identifiers.
    pub address_suffix: String,
    /// Session label sent on connect, for sidecars hosting several sessions.
    pub client_name: Option<String>,
}

impl Default for WsSessionConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:7000/session".to_string(),
            request_timeout: Duration::from_secs(30),
            address_suffix: DEFAULT_ADDRESS_SUFFIX.to_string(),
            client_name: None,
        }
    }
}

/// Creates a [`WsSessionProvider`] per session attempt.
#[derive(Debug, Clone)]
pub struct WsSessionFactory {
    config: WsSessionConfig,
}

impl WsSessionFactory {
    pub fn new(config: WsSessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProviderFactory for WsSessionFactory {
    async fn create(&self, events: EventSink) -> ProviderResult<BoxedProvider> {
        let provider = WsSessionProvider::connect(&self.config, events).await?;
        Ok(Arc::new(provider))
    }
}

/// A session living in a sidecar process, reached over one WebSocket.
///
/// The provider never reconnects by itself: when the socket goes away it
/// reports a single `disconnected` event and fails pending sends. The
/// supervisor decides when to create a new instance.
pub struct WsSessionProvider {
    outbound: mpsc::Sender<String>,
    pending: PendingCalls,
    echo_counter: AtomicU64,
    request_timeout: Duration,
    address_suffix: String,
    cancel: CancellationToken,
}

impl WsSessionProvider {
    /// Connects to the sidecar and starts forwarding its events into `events`.
    pub async fn connect(config: &WsSessionConfig, events: EventSink) -> ProviderResult<Self> {
        let mut request = config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| ProviderError::init(format!("invalid session url {}: {e}", config.url)))?;
        if let Some(name) = &config.client_name {
            let value = HeaderValue::from_str(name)
                .map_err(|e| ProviderError::init(format!("invalid client name: {e}")))?;
            request.headers_mut().insert(CLIENT_NAME_HEADER, value);
        }

        info!(url = %config.url, generation = events.generation(), "Connecting to session sidecar");
        let (ws_stream, _response) = connect_async(request).await.map_err(|e| {
            ProviderError::init(format!("failed to connect to {}: {e}", config.url))
        })?;
        let (ws_tx, ws_rx) = ws_stream.split();
        info!(url = %config.url, "Session sidecar connected");

        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let pending: PendingCalls = Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();

        tokio::spawn(run_session_loop(
            ws_tx,
            ws_rx,
            outbound_rx,
            Arc::clone(&pending),
            events,
            cancel.clone(),
        ));

        Ok(Self {
            outbound: outbound_tx,
            pending,
            echo_counter: AtomicU64::new(1),
            request_timeout: config.request_timeout,
            address_suffix: config.address_suffix.clone(),
            cancel,
        })
    }
}

#[async_trait]
impl SessionProvider for WsSessionProvider {
    async fn send(&self, address: &str, body: &str) -> ProviderResult<()> {
        let echo = self.echo_counter.fetch_add(1, Ordering::SeqCst);
        let frame = serde_json::to_string(&SendMessageRequest {
            echo,
            chat_id: address,
            body,
        })
        .map_err(|e| ProviderError::Protocol(e.to_string()))?;

        // Registered before sending so a fast response is never missed.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(echo, tx);

        debug!(echo, to = %address, "Sending message through session");
        if self.outbound.send(frame).await.is_err() {
            self.pending.lock().remove(&echo);
            return Err(ProviderError::NotConnected);
        }

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) if response.ok => Ok(()),
            Ok(Ok(response)) => Err(ProviderError::send_failed(
                response
                    .error
                    .unwrap_or_else(|| "rejected by session".to_string()),
            )),
            Ok(Err(_)) => Err(ProviderError::NotConnected),
            Err(_) => {
                self.pending.lock().remove(&echo);
                Err(ProviderError::Timeout)
            }
        }
    }

    fn address_suffix(&self) -> &str {
        &self.address_suffix
    }

    async fn shutdown(&self) {
        debug!("Shutting down session provider");
        self.cancel.cancel();
    }
}

impl Drop for WsSessionProvider {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Pumps frames between the socket, the outbound queue and the event sink.
async fn run_session_loop(
    mut ws_tx: WsSink,
    mut ws_rx: WsSource,
    mut outbound_rx: mpsc::Receiver<String>,
    pending: PendingCalls,
    events: EventSink,
    cancel: CancellationToken,
) {
    let generation = events.generation();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(generation, "Session loop cancelled");
                let _ = ws_tx.close().await;
                break;
            }

            Some(frame) = outbound_rx.recv() => {
                if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                    warn!(generation, error = %e, "Failed to write to session socket");
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        trace!(generation, len = text.len(), "Received frame");
                        on_frame(text.as_str(), &pending, &events);
                    }
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => on_frame(text, &pending, &events),
                        Err(_) => warn!(generation, len = data.len(), "Ignoring non UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "session closed the connection".to_string());
                        info!(generation, reason = %reason, "Session socket closed");
                        events.emit(SessionEvent::Disconnected(reason));
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(generation, error = %e, "Session socket error");
                        events.emit(SessionEvent::Disconnected(e.to_string()));
                        break;
                    }
                    None => {
                        info!(generation, "Session stream ended");
                        events.emit(SessionEvent::Disconnected("session stream ended".to_string()));
                        break;
                    }
                }
            }
        }
    }

    // Close the queue first so no new call can register after the drain.
    drop(outbound_rx);
    let dropped = {
        let mut pending = pending.lock();
        let count = pending.len();
        pending.clear();
        count
    };
    if dropped > 0 {
        debug!(generation, count = dropped, "Failed pending sends on disconnect");
    }
}

fn on_frame(text: &str, pending: &PendingCalls, events: &EventSink) {
    match parse_frame(text) {
        Ok(IncomingFrame::Response(response)) => {
            let echo = response.echo;
            match pending.lock().remove(&echo) {
                Some(tx) => {
                    let _ = tx.send(response);
                }
                None => warn!(echo, "Response for unknown echo (timed out?)"),
            }
        }
        Ok(IncomingFrame::Event(frame)) => {
            events.emit(frame.into());
        }
        Err(e) => warn!(error = %e, "Ignoring unrecognized session frame"),
    }
}
