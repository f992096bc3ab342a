//! Lifecycle events consumed by the state machine.

use serde::{Deserialize, Serialize};

/// A message received by the session provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender address.
    pub from: String,
    /// Message text.
    pub body: String,
    /// Provider timestamp (seconds since the epoch).
    pub timestamp: i64,
    /// Provider message type, `chat` for plain text.
    #[serde(rename = "type", default = "default_message_type")]
    pub message_type: String,
}

pub(crate) fn default_message_type() -> String {
    "chat".to_string()
}

/// Events emitted by a session provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A challenge token must be scanned to authenticate.
    QrIssued(String),
    /// The session was authenticated.
    Authenticated,
    /// The session is ready to send and receive.
    Ready,
    /// Authentication was rejected.
    AuthFailed(String),
    /// The session dropped.
    Disconnected(String),
    /// A message arrived.
    MessageReceived(InboundMessage),
}

impl SessionEvent {
    /// Returns the event name as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::QrIssued(_) => "qr-issued",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::AuthFailed(_) => "auth-failed",
            Self::Disconnected(_) => "disconnected",
            Self::MessageReceived(_) => "message-received",
        }
    }
}

/// Everything the state machine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineInput {
    /// An event from the current session provider.
    Session(SessionEvent),
    /// Constructing the provider failed.
    InitFailed(String),
    /// A retry timer fired.
    RetryFired {
        /// Generation the timer was scheduled for.
        generation: u64,
    },
    /// An internal error caught at the top level.
    Fault(String),
}

impl MachineInput {
    /// Returns the input name as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Session(event) => event.name(),
            Self::InitFailed(_) => "init-error",
            Self::RetryFired { .. } => "retry-fired",
            Self::Fault(_) => "fault",
        }
    }
}

impl From<SessionEvent> for MachineInput {
    fn from(event: SessionEvent) -> Self {
        Self::Session(event)
    }
}
