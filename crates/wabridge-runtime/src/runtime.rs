//! Bridge orchestration.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use wabridge_runtime::BridgeRuntime;
//!
//! // Config from ./wabridge.toml, WABRIDGE_* and PORT / N8N_WEBHOOK_URL
//! let runtime = BridgeRuntime::builder().build()?;
//! runtime.run().await?;
//!
//! // Explicit file and profile
//! let runtime = BridgeRuntime::builder()
//!     .config_file("deploy/wabridge.toml")
//!     .profile("production")
//!     .build()?;
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use wabridge_core::{BoxedProviderFactory, ConnectionSupervisor, Relay, SupervisorHandle};
use wabridge_transport::{
    AppState, HttpServer, TransportResult, WebhookRelay, WsSessionFactory,
};

use crate::config::{BridgeConfig, ConfigLoader, Profile};
use crate::error::{RuntimeError, RuntimeResult};
use crate::fault::FaultReporter;
use crate::logging;

/// The bridge service: supervisor, webhook relay and HTTP surface.
pub struct BridgeRuntime {
    config: BridgeConfig,
    profile: Profile,
    factory: Option<BoxedProviderFactory>,
}

impl BridgeRuntime {
    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Installs the configured logging unless a subscriber already exists.
    pub fn from_config(config: BridgeConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            "Runtime initialized from configuration"
        );

        Self {
            config,
            profile: Profile::from_env(),
            factory: None,
        }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Replaces the WebSocket sidecar with another session backend.
    pub fn with_provider_factory(mut self, factory: BoxedProviderFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sets the profile reported as `environment` by the diagnostics route.
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Binds the HTTP server and starts the supervisor.
    ///
    /// Until the bridge stops, panics anywhere in the process and a failing
    /// HTTP server are recorded into its status message.
    pub async fn start(self) -> RuntimeResult<RunningBridge> {
        let relay = WebhookRelay::new(self.config.webhook.to_transport())?;
        match relay.url() {
            Some(url) => info!(url = %url, "Webhook relay enabled"),
            None => warn!("Webhook URL not configured, inbound messages will not be relayed"),
        }

        let factory = self.factory.unwrap_or_else(|| {
            info!(url = %self.config.session.url, "Using WebSocket session sidecar");
            Arc::new(WsSessionFactory::new(self.config.session.to_transport()))
        });

        let supervisor = ConnectionSupervisor::new(
            factory,
            Arc::new(relay) as Arc<dyn Relay>,
            self.config.retry.to_policy(),
        );
        let handle = supervisor.handle();

        let server = HttpServer::bind(
            &self.config.server.bind_addr(),
            AppState::new(handle.clone(), self.profile.as_str()),
        )
        .await?;
        let local_addr = server.local_addr()?;

        let faults = FaultReporter::register(handle.clone());
        let cancel = CancellationToken::new();
        let supervisor = supervisor.spawn(cancel.child_token());
        let server = tokio::spawn(watch_server(
            server.serve(cancel.child_token()),
            handle.clone(),
        ));

        info!(addr = %local_addr, profile = %self.profile, "Bridge started");

        Ok(RunningBridge {
            handle,
            local_addr,
            cancel,
            supervisor,
            server,
            _faults: faults,
        })
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(self) -> RuntimeResult<()> {
        let bridge = self.start().await?;
        info!("Bridge is now running. Press Ctrl+C to stop.");

        wait_for_shutdown().await;

        bridge.stop().await
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let bridge = self.start().await?;
        shutdown.await;
        bridge.stop().await
    }
}

/// A started bridge.
pub struct RunningBridge {
    handle: SupervisorHandle,
    local_addr: SocketAddr,
    cancel: CancellationToken,
    supervisor: JoinHandle<()>,
    server: JoinHandle<TransportResult<()>>,
    _faults: FaultReporter,
}

impl RunningBridge {
    /// Read access to the connection state.
    pub fn handle(&self) -> &SupervisorHandle {
        &self.handle
    }

    /// The address the HTTP server listens on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the HTTP server and the supervisor, shutting the provider down.
    pub async fn stop(self) -> RuntimeResult<()> {
        info!("Stopping bridge");
        self.cancel.cancel();

        if let Err(e) = self.supervisor.await {
            error!(error = %e, "Supervisor task ended abnormally");
        }

        let served = self.server.await.map_err(|e| RuntimeError::Task {
            task: "http server",
            reason: e.to_string(),
        })?;

        info!("Bridge stopped");
        Ok(served?)
    }
}

/// Records a server that stops with an error into the status message.
async fn watch_server<F>(serve: F, handle: SupervisorHandle) -> TransportResult<()>
where
    F: Future<Output = TransportResult<()>>,
{
    let served = serve.await;
    if let Err(e) = &served {
        handle.report_fault(format!("HTTP server failed: {e}"));
    }
    served
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a `BridgeRuntime` with custom configuration.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    factory: Option<BoxedProviderFactory>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            factory: None,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Enables loading environment variables (enabled by default).
    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges a whole configuration as base values.
    pub fn merge(mut self, config: BridgeConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Overrides one dotted key, above files and environment.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    /// Uses `factory` instead of the WebSocket sidecar.
    pub fn provider_factory(mut self, factory: BoxedProviderFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Loads the configuration and builds the runtime.
    pub fn build(self) -> RuntimeResult<BridgeRuntime> {
        let profile = self.config_loader.active_profile().clone();
        let config = self.config_loader.load()?;

        let mut runtime = BridgeRuntime::from_config(config).with_profile(profile);
        runtime.factory = self.factory;
        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use wabridge_core::{
        BoxedProvider, DisabledRelay, EventSink, Phase, ProviderFactory, ProviderResult,
        RetryPolicy, SessionEvent, SessionProvider,
    };
    use wabridge_transport::TransportError;

    #[derive(Default)]
    struct Recorder {
        sink: Mutex<Option<EventSink>>,
        shutdowns: Mutex<u32>,
        panic_on_send: bool,
    }

    struct StubProvider(Arc<Recorder>);

    #[async_trait]
    impl SessionProvider for StubProvider {
        async fn send(&self, _address: &str, _body: &str) -> ProviderResult<()> {
            if self.0.panic_on_send {
                panic!("send exploded");
            }
            Ok(())
        }

        async fn shutdown(&self) {
            *self.0.shutdowns.lock() += 1;
        }
    }

    struct StubFactory(Arc<Recorder>);

    #[async_trait]
    impl ProviderFactory for StubFactory {
        async fn create(&self, events: EventSink) -> ProviderResult<BoxedProvider> {
            *self.0.sink.lock() = Some(events);
            Ok(Arc::new(StubProvider(Arc::clone(&self.0))))
        }
    }

    fn test_config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.server.host = "127.0.0.1".into();
        config.server.port = 0;
        config
    }

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    /// Posts JSON; a dropped connection yields whatever was read.
    async fn post(addr: SocketAddr, path: &str, body: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
             Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        let _ = stream.read_to_string(&mut response).await;
        response
    }

    async fn start_ready(recorder: &Arc<Recorder>) -> RunningBridge {
        let bridge = BridgeRuntime::from_config(test_config())
            .with_provider_factory(Arc::new(StubFactory(Arc::clone(recorder))))
            .start()
            .await
            .unwrap();

        wait_for(|| recorder.sink.lock().is_some()).await;
        let sink = recorder.sink.lock().clone().unwrap();
        sink.emit(SessionEvent::Authenticated);
        sink.emit(SessionEvent::Ready);
        wait_for(|| bridge.handle().state().phase == Phase::Ready).await;
        bridge
    }

    async fn wait_for(mut check: impl FnMut() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_start_serves_and_stop_shuts_provider_down() {
        let recorder = Arc::new(Recorder::default());
        let bridge = BridgeRuntime::from_config(test_config())
            .with_provider_factory(Arc::new(StubFactory(Arc::clone(&recorder))))
            .with_profile(Profile::Production)
            .start()
            .await
            .unwrap();

        wait_for(|| recorder.sink.lock().is_some()).await;
        let sink = recorder.sink.lock().clone().unwrap();
        sink.emit(SessionEvent::Authenticated);
        sink.emit(SessionEvent::Ready);
        wait_for(|| bridge.handle().state().phase == Phase::Ready).await;

        let response = get(bridge.local_addr(), "/test").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains(r#""client":"Connected""#));
        assert!(response.contains(r#""environment":"production""#));
        assert!(response.contains(r#""webhook":"Not configured""#));

        bridge.stop().await.unwrap();
        assert_eq!(*recorder.shutdowns.lock(), 1);
    }

    #[tokio::test]
    async fn test_panicking_send_is_recorded_in_status() {
        let recorder = Arc::new(Recorder {
            panic_on_send: true,
            ..Recorder::default()
        });
        let bridge = start_ready(&recorder).await;

        let response = post(
            bridge.local_addr(),
            "/send",
            r#"{"number":"5511999","message":"hi"}"#,
        )
        .await;
        assert!(!response.contains(r#""success":true"#));

        wait_for(|| bridge.handle().state().status_message == "Error: send exploded").await;
        assert_eq!(bridge.handle().state().phase, Phase::Ready);

        let status = get(bridge.local_addr(), "/status").await;
        assert!(status.contains("Error: send exploded"));

        bridge.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_server_is_recorded_in_status() {
        let supervisor = ConnectionSupervisor::new(
            Arc::new(StubFactory(Arc::default())),
            Arc::new(DisabledRelay),
            RetryPolicy::default(),
        );
        let handle = supervisor.handle();
        let cancel = CancellationToken::new();
        let task = supervisor.spawn(cancel.clone());

        let served = watch_server(
            async { Err(TransportError::Io("listener closed".into())) },
            handle.clone(),
        )
        .await;
        assert!(served.is_err());

        wait_for(|| {
            handle.state().status_message
                == "Error: HTTP server failed: I/O error: listener closed"
        })
        .await;

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_until_returns_after_shutdown_future() {
        let recorder = Arc::new(Recorder::default());
        let runtime = BridgeRuntime::from_config(test_config())
            .with_provider_factory(Arc::new(StubFactory(Arc::clone(&recorder))));

        runtime
            .run_until(tokio::time::sleep(Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!(*recorder.shutdowns.lock(), 1);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_transport_error() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = test_config();
        config.server.port = taken.local_addr().unwrap().port();

        let err = BridgeRuntime::from_config(config)
            .with_provider_factory(Arc::new(StubFactory(Arc::default())))
            .start()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RuntimeError::Transport(_)));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let err = BridgeRuntime::builder()
            .search_path(std::env::temp_dir().join("wabridge-no-such-dir"))
            .without_env()
            .set("session.url", "http://sidecar")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn test_builder_applies_overrides_and_profile() {
        let runtime = BridgeRuntime::builder()
            .search_path(std::env::temp_dir().join("wabridge-no-such-dir"))
            .without_env()
            .profile("staging")
            .set("server.port", 8088)
            .set("retry.reconnect_delay_secs", 5)
            .build()
            .unwrap();

        assert_eq!(runtime.config().server.port, 8088);
        assert_eq!(runtime.config().retry.reconnect_delay_secs, 5);
        assert_eq!(runtime.profile, Profile::Custom("staging".into()));
    }
}
