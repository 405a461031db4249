//! Error types for the ingestion crate.

use thiserror::Error;

use prayer_common::PrayerError;

/// Errors that can occur while processing a month of prayer times.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to decode message body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to convert record for {date}: {source}")]
    Conversion {
        date: String,
        #[source]
        source: PrayerError,
    },

    #[error("Failed to write batch {batch} of {total}: {source}")]
    BatchWrite {
        batch: usize,
        total: usize,
        #[source]
        source: PrayerError,
    },
}

impl IngestionError {
    /// Whether retrying the same payload can never succeed.
    pub fn is_permanent(&self) -> bool {
        match self {
            IngestionError::Decode(_) | IngestionError::Conversion { .. } => true,
            IngestionError::BatchWrite { source, .. } => {
                matches!(source, PrayerError::BatchTooLarge { .. }) || source.is_client_error()
            }
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanence() {
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(IngestionError::Decode(decode).is_permanent());

        let transient = IngestionError::BatchWrite {
            batch: 2,
            total: 2,
            source: PrayerError::DatabaseError("timeout".into()),
        };
        assert!(!transient.is_permanent());

        let oversized = IngestionError::BatchWrite {
            batch: 1,
            total: 1,
            source: PrayerError::BatchTooLarge { size: 26, limit: 25 },
        };
        assert!(oversized.is_permanent());
    }
}
