//! JSON frames exchanged with the session sidecar.
//!
//! Every frame is one WebSocket text message. The sidecar pushes lifecycle
//! events tagged by `event` and answers requests with a frame carrying the
//! request's numeric `echo`:
//!
//! ```text
//! <- {"event":"qr","qr":"2@abc..."}
//! <- {"event":"message","from":"15551234567@c.us","body":"hi","timestamp":1700000000}
//! -> {"action":"send_message","echo":1,"chat_id":"15551234567@c.us","body":"hello"}
//! <- {"echo":1,"ok":true}
//! ```

use serde::{Deserialize, Serialize};

use wabridge_core::{InboundMessage, ProviderError, SessionEvent};

/// Lifecycle event pushed by the sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventFrame {
    Qr {
        qr: String,
    },
    Authenticated,
    Ready,
    AuthFailure {
        #[serde(default)]
        message: String,
    },
    Disconnected {
        #[serde(default)]
        reason: String,
    },
    Message(InboundMessage),
}

impl From<EventFrame> for SessionEvent {
    fn from(frame: EventFrame) -> Self {
        match frame {
            EventFrame::Qr { qr } => Self::QrIssued(qr),
            EventFrame::Authenticated => Self::Authenticated,
            EventFrame::Ready => Self::Ready,
            EventFrame::AuthFailure { message } => Self::AuthFailed(message),
            EventFrame::Disconnected { reason } => Self::Disconnected(reason),
            EventFrame::Message(msg) => Self::MessageReceived(msg),
        }
    }
}

/// Answer to a request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResponseFrame {
    pub echo: u64,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Any frame the sidecar may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IncomingFrame {
    Response(ResponseFrame),
    Event(EventFrame),
}

/// Parses one text frame.
pub fn parse_frame(text: &str) -> Result<IncomingFrame, ProviderError> {
    serde_json::from_str(text).map_err(|e| ProviderError::Protocol(format!("{e}: {text}")))
}

/// Request to send a text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename = "send_message")]
pub struct SendMessageRequest<'a> {
    pub echo: u64,
    pub chat_id: &'a str,
    pub body: &'a str,
}
