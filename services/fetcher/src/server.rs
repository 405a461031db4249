//! HTTP server for fetcher status.
//!
//! Provides endpoints for:
//! - Health check
//! - Last run report and next scheduled run
//! - Prometheus metrics

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::orchestrator::FetchReport;

// ============================================================================
// Shared State
// ============================================================================

/// Scheduler progress, updated by the scheduler and read by handlers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchStatus {
    pub running: bool,
    pub runs_completed: u64,
    pub next_run: Option<DateTime<Utc>>,
    pub last_report: Option<FetchReport>,
}

pub struct ServerState {
    pub status: Arc<RwLock<FetchStatus>>,
    pub zone_count: usize,
    pub prometheus: Option<PrometheusHandle>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub service: String,
    pub zones: usize,
    #[serde(flatten)]
    pub status: FetchStatus,
}

// ============================================================================
// Router
// ============================================================================

/// Create the status API router.
pub fn create_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(Extension(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /status - Last run report and schedule
async fn status_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    let status = state.status.read().await.clone();

    Json(StatusResponse {
        service: "fetcher".to_string(),
        zones: state.zone_count,
        status,
    })
}

/// GET /health - Health check endpoint
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "fetcher"
    }))
}

/// GET /metrics - Prometheus metrics
async fn metrics_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "metrics recorder not installed" })),
        )
            .into_response(),
    }
}

/// Start the HTTP server.
pub async fn run_server(state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!(port = port, "Starting fetcher status server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
