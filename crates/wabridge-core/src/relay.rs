//! Inbound message relay seam.

use serde::Serialize;

use crate::event::InboundMessage;

/// The body forwarded to the external webhook consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayPayload {
    pub from: String,
    pub body: String,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub message_type: String,
}

impl From<InboundMessage> for RelayPayload {
    fn from(msg: InboundMessage) -> Self {
        Self {
            from: msg.from,
            body: msg.body,
            timestamp: msg.timestamp,
            message_type: msg.message_type,
        }
    }
}

/// Forwards inbound messages somewhere else.
///
/// `relay` is fire-and-forget: it must return without waiting for delivery,
/// and a failed delivery is the implementation's business (log it, drop it).
/// Each payload gets at most one attempt. Deliveries of successive payloads
/// may complete in any order.
pub trait Relay: Send + Sync {
    /// Hands the payload off for delivery.
    fn relay(&self, payload: RelayPayload);

    /// Whether relaying actually goes anywhere.
    fn is_configured(&self) -> bool;
}

/// A relay that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRelay;

impl Relay for DisabledRelay {
    fn relay(&self, _payload: RelayPayload) {}

    fn is_configured(&self) -> bool {
        false
    }
}
