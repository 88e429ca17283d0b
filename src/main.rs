//! Audit relay service.
//!
//! Receives storage audit webhooks, normalizes them into canonical events,
//! and relays each one to the configured collector on a best-effort basis.

use std::time::Duration;

use anyhow::{Context, Result};
use auditrelay_api::{server::shutdown_signal, start_server, AppState, Config};
use auditrelay_dispatch::Backend;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config.rust_log);

    info!("Starting audit relay");
    info!(
        collector = %config.webhook_url,
        max_concurrent_sends = config.max_concurrent_sends,
        admission_timeout_ms = config.admission_timeout_ms,
        send_timeout_ms = config.send_timeout_ms,
        workspace = %config.workspace,
        auth_enabled = config.auth_token().is_some(),
        "Configuration loaded"
    );

    let addr = config.parse_server_addr()?;
    let state = AppState::from_config(&config)?;
    let tasks = state.tasks.clone();
    let backend = state.backend.clone();

    start_server(state, addr, shutdown_signal()).await.context("HTTP server failed")?;

    drain_dispatches(&tasks, &backend, Duration::from_secs(config.shutdown_grace_seconds)).await;

    info!("Audit relay shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
///
/// `RUST_LOG` wins when set; `configured` is the fallback directive.
fn init_tracing(configured: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("info,auditrelay=debug,tower_http=debug"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Waits up to `grace` for spawned dispatches, then closes the backend.
async fn drain_dispatches(tasks: &TaskTracker, backend: &Backend, grace: Duration) {
    tasks.close();
    info!(pending = tasks.len(), "Waiting for in-flight dispatches");

    if tokio::time::timeout(grace, tasks.wait()).await.is_err() {
        warn!(
            abandoned = tasks.len(),
            grace_seconds = grace.as_secs(),
            "Shutdown grace period expired with dispatches still running"
        );
    }

    backend.close();
    let stats = backend.stats();
    info!(
        delivered = stats.delivered,
        failed = stats.failed(),
        peak_in_flight = stats.peak_in_flight,
        "Dispatch backend closed"
    );
}
