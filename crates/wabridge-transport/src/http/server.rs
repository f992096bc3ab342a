//! HTTP server lifecycle.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{TransportError, TransportResult};

use super::routes::{AppState, router};

/// A bound, not yet running HTTP server.
#[derive(Debug)]
pub struct HttpServer {
    listener: TcpListener,
    router: Router,
}

impl HttpServer {
    /// Binds `addr` and prepares the bridge routes.
    pub async fn bind(addr: &str, state: AppState) -> TransportResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::Bind {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            listener,
            router: router(state),
        })
    }

    /// The address actually bound (resolves port `0`).
    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves requests until `shutdown` is cancelled.
    pub async fn serve(self, shutdown: CancellationToken) -> TransportResult<()> {
        let addr = self.local_addr()?;
        info!(addr = %addr, "HTTP server listening");

        let result = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await;

        match result {
            Ok(()) => {
                info!("HTTP server shut down");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "HTTP server error");
                Err(e.into())
            }
        }
    }
}
