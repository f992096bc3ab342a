//! Connection state record and its shared snapshot cell.
//!
//! There is exactly one [`ConnectionState`] per running bridge. The supervisor
//! task is its only writer; it publishes every new state as an immutable
//! `Arc` into a [`StateCell`], and readers clone that `Arc`, so a reader never
//! observes a half-applied transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Lifecycle phase of the messaging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// A provider instance is being created or has not reported yet.
    Initializing,
    /// A challenge (QR payload) is waiting to be scanned.
    AwaitingScan,
    /// The session is authenticated but not ready to send yet.
    Authenticated,
    /// The session accepts sends.
    Ready,
    /// The provider rejected the credentials.
    AuthFailed,
    /// The session dropped; a reconnect is scheduled.
    Disconnected,
    /// Provider construction failed; a re-init is scheduled.
    Failed,
}

impl Phase {
    /// Returns the phase name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::AwaitingScan => "awaiting_scan",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::AuthFailed => "auth_failed",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
        }
    }

    /// Whether a retry timer is expected to be pending in this phase.
    pub fn is_recovering(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status messages shown for each phase.
pub mod status {
    pub const INITIALIZING: &str = "Initializing...";
    pub const AWAITING_SCAN: &str = "QR Code generated - ready to scan";
    pub const AUTHENTICATED: &str = "Authenticated";
    pub const READY: &str = "Connected and ready";

    pub fn auth_failed(message: &str) -> String {
        format!("Authentication failed: {message}")
    }

    pub fn disconnected(reason: &str) -> String {
        format!("Disconnected: {reason}")
    }

    pub fn init_failed(reason: &str) -> String {
        format!("Failed to initialize: {reason}")
    }

    pub fn fault(reason: &str) -> String {
        format!("Error: {reason}")
    }
}

/// The connection lifecycle record.
///
/// `pending_challenge` is `Some` (and non-empty) exactly when `phase` is
/// [`Phase::AwaitingScan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    /// Current lifecycle phase.
    pub phase: Phase,
    /// QR payload waiting to be scanned.
    pub pending_challenge: Option<String>,
    /// Human-readable description of the current phase.
    pub status_message: String,
    /// Reason given by the last `disconnected` event.
    pub last_disconnect_reason: Option<String>,
    /// Retry generation; bumped every time a retry timer is scheduled.
    pub generation: u64,
    /// When this record was produced.
    pub updated_at: DateTime<Utc>,
}

impl ConnectionState {
    /// The state a bridge starts in.
    pub fn initial() -> Self {
        Self {
            phase: Phase::Initializing,
            pending_challenge: None,
            status_message: status::INITIALIZING.to_string(),
            last_disconnect_reason: None,
            generation: 0,
            updated_at: Utc::now(),
        }
    }

    /// Whether the provider accepts sends.
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    /// Whether a challenge is pending.
    pub fn has_challenge(&self) -> bool {
        self.pending_challenge.is_some()
    }

    /// Checks the challenge/phase invariant.
    pub fn is_consistent(&self) -> bool {
        let has = self
            .pending_challenge
            .as_deref()
            .is_some_and(|c| !c.is_empty());
        has == (self.phase == Phase::AwaitingScan)
            && (self.pending_challenge.is_none() || has)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Shared cell holding the latest published [`ConnectionState`].
///
/// Cloning the cell shares the same underlying state.
#[derive(Debug, Clone)]
pub struct StateCell {
    inner: Arc<RwLock<Arc<ConnectionState>>>,
}

impl StateCell {
    /// Creates a cell holding the given state.
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(state))),
        }
    }

    /// Returns the latest published state.
    pub fn load(&self) -> Arc<ConnectionState> {
        Arc::clone(&self.inner.read())
    }

    /// Replaces the published state.
    pub(crate) fn publish(&self, state: ConnectionState) {
        *self.inner.write() = Arc::new(state);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(ConnectionState::initial())
    }
}
