//! HTTP server for the ingester service.
//!
//! Provides endpoints for:
//! - `GET /status` - Worker counters and queue depth
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::info;

use storage::IngestQueue;

use crate::worker::WorkerStats;

/// Shared state for the HTTP server.
pub struct ServerState {
    pub stats: Arc<Mutex<WorkerStats>>,
    pub queue: Arc<dyn IngestQueue>,
    pub prometheus: Option<PrometheusHandle>,
}

/// Response body for /status endpoint.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub service: String,
    pub queue_depth: Option<u64>,
    #[serde(flatten)]
    pub stats: WorkerStats,
}

/// Create the router.
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

async fn status_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    let stats = state.stats.lock().await.clone();
    let queue_depth = state.queue.depth().await.ok();

    Json(StatusResponse {
        service: "ingester".to_string(),
        queue_depth,
        stats,
    })
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ingester",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Start the HTTP server.
pub async fn run_server(state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(port = port, "Starting ingester status server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use storage::MemoryQueue;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_status_reports_queue_depth() {
        let queue = Arc::new(MemoryQueue::default());
        queue.send("{}").await.unwrap();

        let state = Arc::new(ServerState {
            stats: Arc::new(Mutex::new(WorkerStats {
                processed: 4,
                ..WorkerStats::default()
            })),
            queue,
            prometheus: None,
        });

        let response = create_router(state)
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["service"], "ingester");
        assert_eq!(body["queue_depth"], 1);
        assert_eq!(body["processed"], 4);
    }
}
