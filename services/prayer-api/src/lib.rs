//! Prayer-times API Service Library
//!
//! Read-only HTTP lookups over the stored prayer-time table.

pub mod error;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    middleware,
    response::Response,
    routing::get,
    Extension, Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/prayer-times",
            get(handlers::prayer_times::prayer_times_handler),
        )
        .route(
            "/prayer-times/month",
            get(handlers::prayer_times::month_handler),
        )
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(middleware::map_response(allow_any_origin))
        .layer(TraceLayer::new_for_http())
}

/// Every response, errors included, is readable cross-origin.
async fn allow_any_origin(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}
