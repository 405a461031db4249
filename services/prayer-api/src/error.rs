//! API error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use prayer_common::PrayerError;

/// Errors returned to API clients as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Zone and date parameter is required")]
    MissingZoneOrDate,

    #[error("Zone, month and year parameter is required")]
    MissingMonthParameters,

    #[error("Invalid date format")]
    InvalidDate,

    #[error("Invalid month or year format")]
    InvalidMonth,

    #[error("Invalid query string")]
    InvalidQuery,

    #[error("Internal server error")]
    Internal(#[from] PrayerError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(source) = &self {
            error!(error = %source, "Store query failed");
        }

        let status = self.status_code();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
