//! Outbound message dispatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DispatchError, DispatchResult, ProviderError};
use crate::supervisor::SupervisorHandle;

/// An outbound send request.
///
/// The wire names (`number`, `message`) are the ones HTTP clients already use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessageRequest {
    /// Bare identifier or fully qualified address.
    #[serde(rename = "number", default)]
    pub target: String,
    /// Message text.
    #[serde(rename = "message", default)]
    pub body: String,
}

impl OutboundMessageRequest {
    pub fn new(target: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            body: body.into(),
        }
    }
}

/// Confirmation of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    /// The normalized address the message went to.
    pub to: String,
    pub timestamp: DateTime<Utc>,
}

/// Qualifies a bare identifier with `suffix`.
///
/// A target that already contains `@` is returned unchanged, so the function
/// is idempotent: `normalize_target("15551234567", "c.us")` yields
/// `"15551234567@c.us"`, and normalizing that again yields the same string.
pub fn normalize_target(target: &str, suffix: &str) -> String {
    if target.contains('@') {
        target.to_string()
    } else {
        format!("{target}@{suffix}")
    }
}

/// Validates outbound requests and forwards them to the current provider.
#[derive(Debug, Clone)]
pub struct MessageDispatchService {
    handle: SupervisorHandle,
}

impl MessageDispatchService {
    pub fn new(handle: SupervisorHandle) -> Self {
        Self { handle }
    }

    /// Sends one message.
    ///
    /// Checks run in order: readiness, then non-empty target and body, then
    /// target normalization. A blank target counts as empty; the body is sent
    /// as given, whitespace included.
    pub async fn send(&self, request: OutboundMessageRequest) -> DispatchResult<Ack> {
        let state = self.handle.state();
        if !state.is_ready() {
            debug!(phase = %state.phase, "Send rejected, not ready");
            return Err(DispatchError::NotReady {
                status: state.status_message.clone(),
            });
        }

        let target = request.target.trim();
        if target.is_empty() || request.body.is_empty() {
            return Err(DispatchError::InvalidRequest(
                "Both number and message are required".to_string(),
            ));
        }

        let provider = self
            .handle
            .provider()
            .ok_or_else(|| DispatchError::from(ProviderError::NotConnected))?;
        let to = normalize_target(target, provider.address_suffix());

        match provider.send(&to, &request.body).await {
            Ok(()) => {
                info!(to = %to, "Message sent");
                Ok(Ack {
                    to,
                    timestamp: Utc::now(),
                })
            }
            Err(e) => {
                warn!(to = %to, error = %e, "Message send failed");
                Err(e.into())
            }
        }
    }
}
