//! Route handlers of the bridge HTTP surface.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use wabridge_core::{
    DispatchError, MessageDispatchService, OutboundMessageRequest, StatusQueryService,
    StatusSnapshot, SupervisorHandle,
};

/// Shared state of the HTTP handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    status: StatusQueryService,
    dispatch: MessageDispatchService,
    started: Instant,
    environment: String,
}

impl AppState {
    /// Creates the state for a running supervisor.
    ///
    /// `environment` is reported by `/test`.
    pub fn new(handle: SupervisorHandle, environment: impl Into<String>) -> Self {
        Self {
            status: StatusQueryService::new(handle.clone()),
            dispatch: MessageDispatchService::new(handle),
            started: Instant::now(),
            environment: environment.into(),
        }
    }

    fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

/// Builds the bridge router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/send", post(send))
        .route("/health", get(health))
        .route("/qr", get(qr))
        .route("/test", get(diagnostics))
        .with_state(state)
}

#[derive(Serialize)]
struct StatusBody {
    #[serde(flatten)]
    snapshot: StatusSnapshot,
    /// Older dashboards read the challenge flag under this name.
    #[serde(rename = "hasQR")]
    has_qr: bool,
}

async fn status(State(state): State<AppState>) -> Json<StatusBody> {
    let snapshot = state.status.snapshot();
    Json(StatusBody {
        has_qr: snapshot.has_challenge,
        snapshot,
    })
}

async fn send(
    State(state): State<AppState>,
    request: Result<Json<OutboundMessageRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => {
            debug!(error = %rejection, "Malformed send request");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Invalid request body",
                    "details": rejection.body_text(),
                })),
            )
                .into_response();
        }
    };

    match state.dispatch.send(request).await {
        Ok(ack) => Json(json!({
            "success": true,
            "message": "Message sent successfully",
            "to": ack.to,
            "timestamp": ack.timestamp,
        }))
        .into_response(),
        Err(err) => dispatch_error_response(err),
    }
}

fn dispatch_error_response(err: DispatchError) -> Response {
    let (code, body) = match err {
        DispatchError::NotReady { status } => (
            StatusCode::BAD_REQUEST,
            json!({ "error": "Bot not ready", "status": status }),
        ),
        DispatchError::InvalidRequest(reason) => {
            (StatusCode::BAD_REQUEST, json!({ "error": reason }))
        }
        DispatchError::ProviderFailure(details) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "Failed to send message", "details": details }),
        ),
    };
    (code, Json(body)).into_response()
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "Server running",
        "timestamp": Utc::now(),
        "uptimeSecs": state.uptime_secs(),
    }))
}

async fn qr(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.status.snapshot();
    match state.status.challenge() {
        Some(qr) => Json(json!({
            "available": true,
            "qr": qr,
            "status": snapshot.status,
        })),
        None => Json(json!({
            "available": false,
            "status": snapshot.status,
        })),
    }
}

async fn diagnostics(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.status.snapshot();
    let client = if snapshot.ready {
        "Connected"
    } else {
        "Not connected"
    };
    let webhook = if snapshot.webhook_configured {
        "Configured"
    } else {
        "Not configured"
    };
    Json(json!({
        "server": "OK",
        "client": client,
        "webhook": webhook,
        "environment": state.environment,
        "uptimeSecs": state.uptime_secs(),
    }))
}
