//! Prayer-time lookups.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Raw query pairs. A repeated key resolves to its last value.
pub type QueryPairs = Vec<(String, String)>;

fn last_value(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .filter(|v| !v.is_empty())
}

fn query_pairs(query: Result<Query<QueryPairs>, QueryRejection>) -> Result<QueryPairs, ApiError> {
    query.map(|Query(pairs)| pairs).map_err(|rejection| {
        debug!(error = %rejection, "Rejected query string");
        ApiError::InvalidQuery
    })
}

/// GET /prayer-times?zone=WLY01&date=15-Jan-2024
///
/// Returns the stored records for the zone and date as a JSON array, empty
/// when nothing matches.
pub async fn prayer_times_handler(
    Extension(state): Extension<Arc<AppState>>,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> Response {
    let result = match query_pairs(query) {
        Ok(pairs) => lookup_day(&state, &pairs).await,
        Err(e) => Err(e),
    };
    respond(result)
}

async fn lookup_day(state: &AppState, pairs: &[(String, String)]) -> Result<Response, ApiError> {
    let (zone, date) = match (last_value(pairs, "zone"), last_value(pairs, "date")) {
        (Some(zone), Some(date)) => (zone, date),
        _ => return Err(ApiError::MissingZoneOrDate),
    };

    if !is_valid_date_format(&date) {
        return Err(ApiError::InvalidDate);
    }

    debug!(zone = %zone, date = %date, "Looking up prayer times");
    let records = state.store.query(&zone, &date).await?;
    Ok(Json(records).into_response())
}

/// GET /prayer-times/month?zone=WLY01&month=Jan&year=2024
pub async fn month_handler(
    Extension(state): Extension<Arc<AppState>>,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> Response {
    let result = match query_pairs(query) {
        Ok(pairs) => lookup_month(&state, &pairs).await,
        Err(e) => Err(e),
    };
    respond(result)
}

async fn lookup_month(state: &AppState, pairs: &[(String, String)]) -> Result<Response, ApiError> {
    let (zone, month, year) = match (
        last_value(pairs, "zone"),
        last_value(pairs, "month"),
        last_value(pairs, "year"),
    ) {
        (Some(zone), Some(month), Some(year)) => (zone, month, year),
        _ => return Err(ApiError::MissingMonthParameters),
    };

    let month_ok = month.len() == 3 && month.bytes().all(is_word_byte);
    let year_ok = year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit());
    if !month_ok || !year_ok {
        return Err(ApiError::InvalidMonth);
    }

    let records = state.store.query_month(&zone, &month, &year).await?;
    Ok(Json(records).into_response())
}

fn respond(result: Result<Response, ApiError>) -> Response {
    let response = match result {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };

    let status = response.status().as_u16().to_string();
    metrics::counter!("api_requests_total", "status" => status).increment(1);
    response
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// `DD-MMM-YYYY` shape check: two digits, three word characters, four
/// digits. Calendar validity is not checked.
pub fn is_valid_date_format(date: &str) -> bool {
    let bytes = date.as_bytes();
    if bytes.len() != 11 || bytes[2] != b'-' || bytes[6] != b'-' {
        return false;
    }

    bytes[..2].iter().all(u8::is_ascii_digit)
        && bytes[3..6].iter().copied().all(is_word_byte)
        && bytes[7..].iter().all(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_format() {
        assert!(is_valid_date_format("15-Jan-2024"));
        assert!(is_valid_date_format("01-jan-2024"));
        // Shape only
        assert!(is_valid_date_format("99-XYZ-0000"));

        for bad in [
            "2024-01-15",
            "15-January-2024",
            "5-Jan-2024",
            "15-Jan-24",
            "15/Jan/2024",
            "15-Ja!-2024",
            " 15-Jan-2024",
            "",
        ] {
            assert!(!is_valid_date_format(bad), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_last_value_wins() {
        let pairs: QueryPairs = vec![
            ("zone".into(), "WLY01".into()),
            ("date".into(), "15-Jan-2024".into()),
            ("zone".into(), "SGR01".into()),
            ("year".into(), "".into()),
        ];
        assert_eq!(last_value(&pairs, "zone").as_deref(), Some("SGR01"));
        assert_eq!(last_value(&pairs, "date").as_deref(), Some("15-Jan-2024"));
        assert_eq!(last_value(&pairs, "year"), None);
        assert_eq!(last_value(&pairs, "month"), None);
    }
}
