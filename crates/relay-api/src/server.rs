//! Lifecycle of the relay HTTP server: `Stopped -> Running -> Stopped`.
use std::{
    net::{IpAddr, SocketAddr, UdpSocket},
    sync::{Arc, PoisonError},
};

use relay_core::{
    CorrelationRegistry, Dispatcher, EventHook, MetricsHandle, ResultSink, Sweeper,
    SweeperHandle, noop_metrics,
};
use relay_model::Script;
use tokio::{net::TcpListener, sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    adapter::{DispatcherApiAdapter, HookSlot},
    config::GatewayConfig,
    directory::ScriptDirectory,
    error::ServerError,
    http::HttpApi,
};

struct Running {
    addr: SocketAddr,
    shutdown: CancellationToken,
    sweeper: SweeperHandle,
    server: JoinHandle<std::io::Result<()>>,
}

/// Owns the script directory, the correlation registry and, while running, the
/// listener and the sweeper.
pub struct HttpGateway {
    config: GatewayConfig,
    registry: CorrelationRegistry,
    directory: ScriptDirectory,
    hook: HookSlot,
    metrics: MetricsHandle,
    running: Mutex<Option<Running>>,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            registry: CorrelationRegistry::new(),
            directory: ScriptDirectory::new(),
            hook: HookSlot::default(),
            metrics: noop_metrics(),
            running: Mutex::new(None),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &CorrelationRegistry {
        &self.registry
    }

    pub fn directory(&self) -> &ScriptDirectory {
        &self.directory
    }

    /// Sink the executor reports results through.
    pub fn result_sink(&self) -> ResultSink {
        ResultSink::new(self.registry.clone()).with_metrics(self.metrics.clone())
    }

    /// Install the executor hook; replaces any previous one.
    pub fn set_hook(&self, hook: impl EventHook) {
        *self.hook.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    /// Remove the executor hook; later requests fail with `ExecutorUnavailable`.
    pub fn clear_hook(&self) {
        *self.hook.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Bind the listener and start serving. Returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let bind = self.config.bind;
        let listener = TcpListener::bind(bind)
            .await
            .map_err(|source| ServerError::Bind { addr: bind, source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr: bind, source })?;

        let shutdown = CancellationToken::new();
        let dispatcher = Dispatcher::new(self.registry.clone(), self.config.dispatch.clone())
            .with_metrics(self.metrics.clone())
            .with_shutdown(shutdown.clone());
        let adapter = DispatcherApiAdapter::new(self.directory.clone(), dispatcher)
            .with_hook_slot(self.hook.clone());
        let router = HttpApi::new(Arc::new(adapter))
            .with_prefix(&self.config.prefix)
            .router();

        let sweeper = Sweeper::new(self.registry.clone(), self.config.sweeper.clone())
            .with_metrics(self.metrics.clone())
            .spawn();

        let signal = shutdown.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });

        info!(%addr, prefix = %self.config.prefix, "relay server started");
        *running = Some(Running {
            addr,
            shutdown,
            sweeper,
            server,
        });
        Ok(addr)
    }

    /// Stop serving. Waiting requests resolve as unavailable. No-op when stopped.
    ///
    /// Connections still busy after the stop grace period are dropped.
    pub async fn stop(&self) -> Result<(), ServerError> {
        let Some(mut running) = self.running.lock().await.take() else {
            return Ok(());
        };

        running.shutdown.cancel();
        let closed = self.registry.close_all();

        let sweeper = running.sweeper.stop().await;
        let grace = self.config.stop_grace();
        let server = match tokio::time::timeout(grace, &mut running.server).await {
            Ok(joined) => Some(joined),
            Err(_) => {
                warn!(addr = %running.addr, ?grace, "connections still open, aborting server");
                running.server.abort();
                let _ = (&mut running.server).await;
                None
            }
        };

        if let Err(e) = sweeper {
            return Err(ServerError::StopFailed(format!("sweeper: {e}")));
        }
        match server {
            Some(Ok(Ok(()))) | None => {}
            Some(Ok(Err(e))) => return Err(ServerError::StopFailed(e.to_string())),
            Some(Err(e)) => return Err(ServerError::StopFailed(format!("server task: {e}"))),
        }

        info!(addr = %running.addr, closed, "relay server stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Bound address while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.addr)
    }

    /// Expose `script` over HTTP, starting the server when it is not running.
    pub async fn enable_script(&self, script: Script) -> Result<(), ServerError> {
        let name = script.name.clone();
        let identifier = self.directory.enable(script);

        if !self.is_running().await {
            match self.start().await {
                Ok(_) | Err(ServerError::AlreadyRunning) => {}
                Err(e) => return Err(e),
            }
        }

        let route = self.route(&identifier);
        info!(%name, %route, "script http enabled");
        Ok(())
    }

    /// Stop exposing `script`. The server keeps running.
    pub fn disable_script(&self, script: &Script) -> bool {
        let removed = self.directory.disable(script);
        if removed {
            info!(name = %script.name, identifier = %script.identifier(), "script http disabled");
        }
        removed
    }

    pub fn is_script_enabled(&self, script: &Script) -> bool {
        self.directory.is_enabled(script)
    }

    /// URL a LAN client can call `script` on.
    pub async fn script_url(&self, script: &Script) -> String {
        let port = self
            .local_addr()
            .await
            .map_or(self.config.bind.port(), |addr| addr.port());
        format!(
            "http://{}:{}{}?content=xx",
            lan_host(),
            port,
            self.route(&script.identifier())
        )
    }

    /// `/{prefix}/{identifier}`, or `/{identifier}` with an empty prefix.
    fn route(&self, identifier: &str) -> String {
        match self.config.prefix.trim_matches('/') {
            "" => format!("/{identifier}"),
            prefix => format!("/{prefix}/{identifier}"),
        }
    }
}

/// LAN address of the outbound interface, or the host name when there is none.
fn lan_host() -> String {
    match outbound_ip() {
        Some(ip) => ip.to_string(),
        None => {
            warn!("no outbound interface, falling back to host name");
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "localhost".to_string())
        }
    }
}

/// Connecting a UDP socket only selects a route; no packet is sent.
fn outbound_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}

#[cfg(test)]
mod tests {
    use relay_model::{ExecutionRequest, Outcome};

    use super::*;

    fn local_config() -> GatewayConfig {
        GatewayConfig {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..GatewayConfig::default()
        }
    }

    #[tokio::test]
    async fn start_twice_is_rejected_and_stop_is_idempotent() {
        let gateway = HttpGateway::new(local_config());

        let addr = gateway.start().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert!(gateway.is_running().await);
        assert_eq!(gateway.local_addr().await, Some(addr));
        assert!(matches!(gateway.start().await, Err(ServerError::AlreadyRunning)));

        gateway.stop().await.unwrap();
        assert!(!gateway.is_running().await);
        gateway.stop().await.unwrap();
    }

    #[tokio::test]
    async fn can_restart_after_stop() {
        let gateway = HttpGateway::new(local_config());
        gateway.start().await.unwrap();
        gateway.stop().await.unwrap();
        gateway.start().await.unwrap();
        gateway.stop().await.unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let gateway = HttpGateway::new(GatewayConfig {
            bind: taken.local_addr().unwrap(),
            ..GatewayConfig::default()
        });

        assert!(matches!(gateway.start().await, Err(ServerError::Bind { .. })));
        assert!(!gateway.is_running().await);
    }

    #[tokio::test]
    async fn enable_script_starts_server_and_disable_keeps_it() {
        let gateway = HttpGateway::new(local_config());
        let script = Script::new("user_script_0001", "upper").with_plugin_id("abc123");

        gateway.enable_script(script.clone()).await.unwrap();
        assert!(gateway.is_running().await);
        assert!(gateway.is_script_enabled(&script));

        assert!(gateway.disable_script(&script));
        assert!(!gateway.is_script_enabled(&script));
        assert!(gateway.is_running().await);
        gateway.stop().await.unwrap();
    }

    #[tokio::test]
    async fn script_url_points_at_identifier() {
        let gateway = HttpGateway::new(GatewayConfig::default());
        let script = Script::new("user_script_0001", "upper").with_plugin_id("abc123");

        let url = gateway.script_url(&script).await;
        assert!(url.starts_with("http://"), "{url}");
        assert!(url.ends_with(":6527/clip-save/abc123?content=xx"), "{url}");
    }

    #[tokio::test]
    async fn script_url_without_prefix_points_at_root() {
        let gateway = HttpGateway::new(GatewayConfig {
            prefix: "/".to_string(),
            ..GatewayConfig::default()
        });
        let script = Script::new("user_script_0001", "upper").with_plugin_id("abc123");

        let url = gateway.script_url(&script).await;
        assert!(url.ends_with(":6527/abc123?content=xx"), "{url}");
    }

    #[tokio::test]
    async fn zero_sweep_interval_does_not_break_lifecycle() {
        let mut config = local_config();
        config.sweeper.interval_ms = 0;
        let gateway = HttpGateway::new(config);

        gateway.start().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        gateway.stop().await.unwrap();
    }

    #[tokio::test]
    async fn hook_can_be_swapped_and_cleared() {
        let gateway = HttpGateway::new(local_config());
        let sink = gateway.result_sink();
        gateway.set_hook(move |_: &'static str, req: ExecutionRequest| {
            sink.deliver(&req.token, Outcome::empty());
        });
        assert!(gateway.hook.read().unwrap().is_some());

        gateway.clear_hook();
        assert!(gateway.hook.read().unwrap().is_none());
    }
}
