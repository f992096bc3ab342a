//! Webhook relay.
//!
//! Inbound messages are POSTed as JSON to a configured URL. Each payload gets
//! exactly one attempt; failures are logged and dropped. At most
//! `max_in_flight` deliveries run at once, and a payload that arrives while
//! the bound is exhausted is dropped instead of queued, so a slow consumer
//! can never back up into the connection supervisor.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use tokio::sync::Semaphore;
use tracing::{debug, trace, warn};

use wabridge_core::{Relay, RelayPayload};

use crate::error::{TransportError, TransportResult};

/// URL value shipped in sample deployments; treated as "not configured".
pub const PLACEHOLDER_WEBHOOK_URL: &str = "YOUR_N8N_WEBHOOK_URL";

/// Webhook relay settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Target URL. `None`, empty or the placeholder disables relaying.
    pub url: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum concurrent deliveries.
    pub max_in_flight: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout: Duration::from_secs(10),
            max_in_flight: 16,
        }
    }
}

impl WebhookConfig {
    /// Creates a config targeting `url` with default limits.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

/// Returns the usable URL, or `None` when relaying is disabled.
pub fn effective_url(url: Option<&str>) -> Option<&str> {
    url.map(str::trim)
        .filter(|u| !u.is_empty() && *u != PLACEHOLDER_WEBHOOK_URL)
}

/// Fire-and-forget HTTP relay.
#[derive(Debug, Clone)]
pub struct WebhookRelay {
    client: Client,
    url: Option<Arc<str>>,
    permits: Arc<Semaphore>,
}

impl WebhookRelay {
    /// Builds the relay and its HTTP client.
    pub fn new(config: WebhookConfig) -> TransportResult<Self> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::InvalidConfig(format!("webhook client: {e}")))?;

        Ok(Self {
            client,
            url: effective_url(config.url.as_deref()).map(Arc::from),
            permits: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
        })
    }

    /// The target URL, if relaying is enabled.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Delivers one payload and waits for the outcome.
    pub async fn deliver(&self, payload: &RelayPayload) -> TransportResult<()> {
        match &self.url {
            Some(url) => post_payload(&self.client, url, payload).await,
            None => Ok(()),
        }
    }
}

impl Relay for WebhookRelay {
    fn relay(&self, payload: RelayPayload) {
        let Some(url) = self.url.clone() else {
            trace!(from = %payload.from, "Webhook not configured, message not relayed");
            return;
        };

        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            warn!(from = %payload.from, "Webhook relay saturated, dropping message");
            return;
        };

        let client = self.client.clone();
        tokio::spawn(async move {
            let _permit = permit;
            match post_payload(&client, &url, &payload).await {
                Ok(()) => debug!(from = %payload.from, "Message relayed to webhook"),
                Err(e) => warn!(from = %payload.from, error = %e, "Webhook delivery failed"),
            }
        });
    }

    fn is_configured(&self) -> bool {
        self.url.is_some()
    }
}

async fn post_payload(client: &Client, url: &str, payload: &RelayPayload) -> TransportResult<()> {
    let resp = client
        .post(url)
        .json(payload)
        .send()
        .await
        .map_err(|e| TransportError::Delivery(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(TransportError::Status {
            code: status.as_u16(),
            body,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::Value;
    use tokio::sync::{Notify, mpsc};
    use tokio_test::assert_ok;

    fn payload(body: &str) -> RelayPayload {
        RelayPayload {
            from: "15551234567@c.us".into(),
            body: body.into(),
            timestamp: 1_700_000_000,
            message_type: "chat".into(),
        }
    }

    /// Spawns a webhook consumer that answers `status` once `gate` allows it.
    async fn spawn_consumer(
        status: StatusCode,
        gate: Option<Arc<Notify>>,
    ) -> (String, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            "/hook",
            post(move |Json(body): Json<Value>| {
                let tx = tx.clone();
                let gate = gate.clone();
                async move {
                    let _ = tx.send(body);
                    if let Some(gate) = gate {
                        gate.notified().await;
                    }
                    status
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/hook"), rx)
    }

    async fn closed_port_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/hook")
    }

    #[test]
    fn test_placeholder_and_empty_disable_relay() {
        assert_eq!(effective_url(None), None);
        assert_eq!(effective_url(Some("")), None);
        assert_eq!(effective_url(Some("  ")), None);
        assert_eq!(effective_url(Some(PLACEHOLDER_WEBHOOK_URL)), None);
        assert_eq!(
            effective_url(Some("https://hooks.example.com/x")),
            Some("https://hooks.example.com/x")
        );
    }

    #[tokio::test]
    async fn test_is_configured() {
        let relay = WebhookRelay::new(WebhookConfig::default()).unwrap();
        assert!(!relay.is_configured());

        let relay = WebhookRelay::new(WebhookConfig::with_url(PLACEHOLDER_WEBHOOK_URL)).unwrap();
        assert!(!relay.is_configured());
        relay.relay(payload("ignored"));

        let relay = WebhookRelay::new(WebhookConfig::with_url("http://127.0.0.1:9/hook")).unwrap();
        assert!(relay.is_configured());
    }

    #[tokio::test]
    async fn test_relay_posts_payload() {
        let (url, mut rx) = spawn_consumer(StatusCode::OK, None).await;
        let relay = WebhookRelay::new(WebhookConfig::with_url(url)).unwrap();

        relay.relay(payload("hello"));

        let body = rx.recv().await.unwrap();
        assert_eq!(body["from"], "15551234567@c.us");
        assert_eq!(body["body"], "hello");
        assert_eq!(body["timestamp"], 1_700_000_000);
        assert_eq!(body["type"], "chat");
    }

    #[tokio::test]
    async fn test_deliver_reports_status() {
        let (url, _rx) = spawn_consumer(StatusCode::INTERNAL_SERVER_ERROR, None).await;
        let relay = WebhookRelay::new(WebhookConfig::with_url(url)).unwrap();

        let err = relay.deliver(&payload("x")).await.unwrap_err();
        assert!(matches!(err, TransportError::Status { code: 500, .. }));
    }

    #[tokio::test]
    async fn test_deliver_reports_unreachable_endpoint() {
        let relay = WebhookRelay::new(WebhookConfig::with_url(closed_port_url().await)).unwrap();

        let err = relay.deliver(&payload("x")).await.unwrap_err();
        assert!(matches!(err, TransportError::Delivery(_)));

        // The fire-and-forget path swallows the same failure.
        relay.relay(payload("y"));
    }

    #[tokio::test]
    async fn test_disabled_deliver_is_noop() {
        let relay = WebhookRelay::new(WebhookConfig::default()).unwrap();
        assert_ok!(relay.deliver(&payload("x")).await);
    }

    #[tokio::test]
    async fn test_saturated_relay_drops_payload() {
        let gate = Arc::new(Notify::new());
        let (url, mut rx) = spawn_consumer(StatusCode::OK, Some(Arc::clone(&gate))).await;
        let relay = WebhookRelay::new(WebhookConfig {
            max_in_flight: 1,
            ..WebhookConfig::with_url(url)
        })
        .unwrap();

        relay.relay(payload("first"));
        assert_eq!(rx.recv().await.unwrap()["body"], "first");

        relay.relay(payload("second"));
        gate.notify_one();

        let extra = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(extra.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_complete_in_any_order() {
        let (url, mut rx) = spawn_consumer(StatusCode::OK, None).await;
        let relay = WebhookRelay::new(WebhookConfig::with_url(url)).unwrap();

        for body in ["a", "b", "c"] {
            relay.relay(payload(body));
        }

        // Only the set of delivered payloads is guaranteed, not their order.
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(rx.recv().await.unwrap()["body"].as_str().unwrap().to_string());
        }
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c"]);
    }
}
