use std::sync::Arc;

use axum::{Router, http::StatusCode, routing::get};
use tracing::{info, warn};

use relay_api::{GatewayConfig, HttpGateway};
use relay_model::{ExecutionRequest, Outcome, Script};
use relay_observe::{LoggerConfig, LoggerLevel, init_logger};
use relay_prometheus::PrometheusMetrics;

const METRICS_ADDR: &str = "127.0.0.1:9464";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Logger
    let cfg = LoggerConfig {
        level: LoggerLevel::new("relay_core=debug,relay_api=debug,info")?,
        ..Default::default()
    };
    init_logger(&cfg)?;
    info!("logger initialized");

    // 2) Metrics
    let metrics = PrometheusMetrics::new()?;

    // 3) Gateway
    let gateway = HttpGateway::new(GatewayConfig::default()).with_metrics(Arc::new(metrics.clone()));

    // 4) Executor: answers on its own task, the way a host event loop would
    let sink = gateway.result_sink();
    gateway.set_hook(move |event: &'static str, req: ExecutionRequest| {
        info!(event, token = %req.token, script = %req.script_id, "execution requested");
        let sink = sink.clone();
        tokio::spawn(async move {
            let outcome = if req.content.is_empty() {
                Outcome::error("content is empty")
            } else {
                Outcome::success(req.content.to_uppercase())
            };
            sink.deliver(&req.token, outcome);
        });
    });

    // 5) Expose a script; this also starts the server
    let script = Script::new("user_script_0001", "uppercase").with_plugin_id("abc123");
    gateway.enable_script(script.clone()).await?;
    let url = gateway.script_url(&script).await;
    info!(%url, "try it");

    // 6) Metrics endpoint
    let metrics_router = Router::new().route(
        "/metrics",
        get(move || {
            let metrics = metrics.clone();
            async move {
                metrics
                    .render()
                    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind(METRICS_ADDR).await?;
    info!("metrics on http://{METRICS_ADDR}/metrics");
    let metrics_server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, metrics_router).await {
            warn!(error = %e, "metrics server failed");
        }
    });

    // 7) Keep running
    info!("press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutting down...");

    gateway.stop().await?;
    metrics_server.abort();
    Ok(())
}
