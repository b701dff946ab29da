//! HTTP server exposing KPI snapshots to the dashboard and prompt layer.
//!
//! # Architecture
//!
//! ```text
//! Dashboard / prompt builder ──→ GET /kpi ──→ KpiEngine ──→ CachedSource ──→ event store
//! ```
//!
//! Handlers never fail because of the event store: the engine degrades to
//! zeros and reports on its diagnostics log instead.

use crate::core::{KpiEngine, KpiPayload, LogEntry};
use crate::diagnostics::{SourceIssue, SourceStats};
use axum::{
    extract::State,
    http::HeaderValue,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Shared server state
pub struct ServerState {
    engine: Arc<KpiEngine>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Diagnostics response
#[derive(Serialize)]
pub struct DiagnosticsResponse {
    pub stats: SourceStats,
    pub recent_issues: Vec<SourceIssue>,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /kpi
async fn kpi(State(state): State<Arc<ServerState>>) -> Json<KpiPayload> {
    Json(state.engine.snapshot().await)
}

/// GET /recent
async fn recent(State(state): State<Arc<ServerState>>) -> Json<Vec<LogEntry>> {
    Json(state.engine.recent_log().await)
}

/// GET /diagnostics
async fn diagnostics(State(state): State<Arc<ServerState>>) -> Json<DiagnosticsResponse> {
    let log = state.engine.log();
    Json(DiagnosticsResponse {
        stats: log.stats(),
        recent_issues: log.recent_issues(),
    })
}

/// Build the router over an engine.
pub fn router(engine: Arc<KpiEngine>) -> Router {
    let state = Arc::new(ServerState { engine });

    Router::new()
        .route("/health", get(health))
        .route("/kpi", get(kpi))
        .route("/recent", get(recent))
        .route("/diagnostics", get(diagnostics))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    engine: Arc<KpiEngine>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(engine);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("KPI server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
