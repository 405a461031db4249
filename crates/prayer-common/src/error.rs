//! Error types for prayer-times services.

use thiserror::Error;

/// Result type alias using PrayerError.
pub type PrayerResult<T> = Result<T, PrayerError>;

/// Primary error type shared by the pipeline crates.
#[derive(Debug, Error)]
pub enum PrayerError {
    // === Input Errors ===
    #[error("Invalid zone code: {0}")]
    InvalidZone(String),

    #[error("Invalid date (expected DD-MMM-YYYY): {0}")]
    InvalidDate(String),

    #[error("Invalid time of day (expected HH:MM or HH:MM:SS): {0}")]
    InvalidTime(String),

    // === Storage Errors ===
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Queue error: {0}")]
    QueueError(String),

    #[error("Batch of {size} items exceeds the write limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
}

impl PrayerError {
    /// Whether the error was caused by bad input rather than infrastructure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PrayerError::InvalidZone(_) | PrayerError::InvalidDate(_) | PrayerError::InvalidTime(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(PrayerError::InvalidDate("x".into()).is_client_error());
        assert!(PrayerError::InvalidZone("x".into()).is_client_error());
        assert!(!PrayerError::DatabaseError("down".into()).is_client_error());
        assert!(!PrayerError::QueueError("x".into()).is_client_error());
    }
}
