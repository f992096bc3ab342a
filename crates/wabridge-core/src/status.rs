//! Read-only status projection.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::Phase;
use crate::supervisor::SupervisorHandle;

/// Point-in-time view of the bridge, built from one published state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// `true` iff the phase is `Ready`.
    pub ready: bool,
    pub status: String,
    pub has_challenge: bool,
    pub webhook_configured: bool,
    pub phase: Phase,
    pub timestamp: DateTime<Utc>,
}

/// Answers status queries.
#[derive(Debug, Clone)]
pub struct StatusQueryService {
    handle: SupervisorHandle,
}

impl StatusQueryService {
    pub fn new(handle: SupervisorHandle) -> Self {
        Self { handle }
    }

    /// Returns a consistent snapshot of the current state.
    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.handle.state();
        StatusSnapshot {
            ready: state.is_ready(),
            status: state.status_message.clone(),
            has_challenge: state.has_challenge(),
            webhook_configured: self.handle.relay_configured(),
            phase: state.phase,
            timestamp: Utc::now(),
        }
    }

    /// The pending QR payload, if one is waiting to be scanned.
    pub fn challenge(&self) -> Option<String> {
        self.handle.state().pending_challenge.clone()
    }
}
