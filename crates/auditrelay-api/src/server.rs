//! HTTP server configuration and request routing.
//!
//! Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response logging
//! 3. Timeout enforcement
//! 4. Body size limit and token check (webhook routes only)
//! 5. Handler execution
//!
//! # Graceful Shutdown
//!
//! On the shutdown signal the listener stops accepting connections and
//! in-flight requests finish. Dispatches spawned by those requests live on
//! [`AppState::tasks`]; draining them is left to the caller.

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use auditrelay_core::Normalizer;
use auditrelay_dispatch::Backend;
use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::task::TaskTracker;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::Config,
    handlers::{self, IngestStats},
    middleware::auth_middleware,
};

const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Converts payloads into canonical events.
    pub normalizer: Arc<Normalizer>,
    /// Sends events to the collector.
    pub backend: Arc<Backend>,
    /// Tracks spawned dispatches so shutdown can wait for them.
    pub tasks: TaskTracker,
    /// Intake counters.
    pub ingest: Arc<IngestStats>,
    /// Token required on webhook routes, if any.
    pub auth_token: Option<Arc<str>>,
    /// Largest accepted payload in bytes.
    pub max_payload_bytes: usize,
    /// Inbound request timeout.
    pub request_timeout: Duration,
}

impl AppState {
    /// Creates state with no token check and default limits.
    pub fn new(normalizer: Normalizer, backend: Arc<Backend>) -> Self {
        Self {
            normalizer: Arc::new(normalizer),
            backend,
            tasks: TaskTracker::new(),
            ingest: Arc::new(IngestStats::default()),
            auth_token: None,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Builds the normalizer and dispatch backend described by `config`.
    ///
    /// # Errors
    ///
    /// Fails if the dispatch backend rejects the configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let backend = Backend::new(config.to_dispatch_config())
            .context("Failed to create dispatch backend")?;
        let normalizer = Normalizer::new(config.to_normalizer_config());

        Ok(Self::new(normalizer, Arc::new(backend))
            .with_auth_token(config.auth_token())
            .with_max_payload_bytes(config.max_payload_bytes)
            .with_request_timeout(Duration::from_secs(config.request_timeout)))
    }

    /// Requires `token` on webhook routes. An empty token disables the check.
    #[must_use]
    pub fn with_auth_token(mut self, token: Option<&str>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty()).map(Arc::from);
        self
    }

    /// Sets the payload size limit.
    #[must_use]
    pub fn with_max_payload_bytes(mut self, limit: usize) -> Self {
        self.max_payload_bytes = limit;
        self
    }

    /// Sets the inbound request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Creates the Axum router with all routes and middleware.
///
/// Webhooks are accepted on both `/webhook` and `/`; the provider's target
/// URL decides which one is hit.
pub fn create_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(handlers::health_check));

    let webhook_routes = Router::new()
        .route("/webhook", post(handlers::ingest_webhook))
        .route("/", post(handlers::ingest_webhook))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(DefaultBodyLimit::max(state.max_payload_bytes));

    Router::new()
        .merge(health_routes)
        .merge(webhook_routes)
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Middleware to inject request ID into all responses.
///
/// Adds X-Request-Id header for tracing requests across services.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Binds `addr` and serves until `shutdown` resolves.
///
/// # Errors
///
/// Returns `std::io::Error` if the address cannot be bound or the server
/// fails while running.
///
/// # Example
///
/// ```no_run
/// use auditrelay_api::{server::{shutdown_signal, start_server}, AppState, Config};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = Config::load()?;
///     let state = AppState::from_config(&config)?;
///
///     start_server(state, config.parse_server_addr()?, shutdown_signal()).await?;
///     Ok(())
/// }
/// ```
pub async fn start_server<F>(
    state: AppState,
    addr: SocketAddr,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, shutdown).await
}

/// Serves the router on an already bound listener until `shutdown` resolves.
///
/// Peer addresses are exposed to handlers for source IP detection.
///
/// # Errors
///
/// Returns `std::io::Error` if the server fails while running.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let actual_addr = listener.local_addr()?;
    let app = create_router(state);

    info!("HTTP server listening on {}", actual_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    warn!("No longer accepting webhooks, finishing in-flight requests");
}
