//! Processor: one upstream month response in, stored records out.

use std::sync::Arc;

use tracing::{info, instrument};

use prayer_common::time::{compute_expiry, normalize_record, split_date};
use prayer_common::{StoredPrayerRecord, UpstreamDailyRecord, UpstreamMonthResponse, ZoneCode};
use storage::{PrayerStore, BATCH_WRITE_LIMIT};

use crate::error::{IngestionError, Result};

/// Outcome of processing one month response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub zone: ZoneCode,
    pub batches_written: usize,
    pub records_written: usize,
}

/// Normalizes upstream records and writes them in atomic batches.
pub struct Processor {
    store: Arc<dyn PrayerStore>,
}

impl Processor {
    pub fn new(store: Arc<dyn PrayerStore>) -> Self {
        Self { store }
    }

    /// Decode a queued message body and process it.
    pub async fn process_message(&self, body: &str) -> Result<ProcessSummary> {
        let response: UpstreamMonthResponse = serde_json::from_str(body)?;
        self.process(&response).await
    }

    /// Convert and store every daily record of `response`.
    ///
    /// Batches are submitted in date order. The first failure aborts the
    /// call; batches written before it stay written.
    #[instrument(skip(self, response), fields(zone = %response.zone))]
    pub async fn process(&self, response: &UpstreamMonthResponse) -> Result<ProcessSummary> {
        let zone = &response.zone;

        let Some(first) = response.prayer_time.first() else {
            info!("Response has no daily records, nothing to store");
            return Ok(ProcessSummary {
                zone: zone.clone(),
                batches_written: 0,
                records_written: 0,
            });
        };

        let (_, month, year) = split_date(&first.date).map_err(|source| {
            IngestionError::Conversion {
                date: first.date.clone(),
                source,
            }
        })?;

        let total = response.prayer_time.len().div_ceil(BATCH_WRITE_LIMIT);
        let mut records_written = 0;

        for (index, chunk) in response.prayer_time.chunks(BATCH_WRITE_LIMIT).enumerate() {
            let batch = chunk
                .iter()
                .map(|daily| to_stored_record(zone, daily, &month, &year))
                .collect::<Result<Vec<_>>>()?;

            self.store
                .put_batch(&batch)
                .await
                .map_err(|source| IngestionError::BatchWrite {
                    batch: index + 1,
                    total,
                    source,
                })?;

            metrics::counter!("processor_batches_total").increment(1);
            records_written += batch.len();
        }

        info!(
            batches = total,
            records = records_written,
            month = %month,
            year = %year,
            "Stored prayer times"
        );

        Ok(ProcessSummary {
            zone: zone.clone(),
            batches_written: total,
            records_written,
        })
    }
}

/// Build the stored form of one daily record.
///
/// `month` and `year` are taken from the response's first record so every
/// record of one response lands in the same month partition.
pub fn to_stored_record(
    zone: &ZoneCode,
    daily: &UpstreamDailyRecord,
    month: &str,
    year: &str,
) -> Result<StoredPrayerRecord> {
    let conversion = |source| IngestionError::Conversion {
        date: daily.date.clone(),
        source,
    };

    let (day, _, _) = split_date(&daily.date).map_err(conversion)?;
    let times = normalize_record(daily).map_err(conversion)?;
    let ttl = compute_expiry(&daily.date).map_err(conversion)?;

    Ok(StoredPrayerRecord {
        zone_id: zone.clone(),
        date: daily.date.clone(),
        day,
        month: month.to_string(),
        year: year.to_string(),
        times,
        ttl,
    })
}
