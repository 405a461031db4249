//! Persistence interface for normalized prayer-time records.

use std::collections::HashMap;

use async_trait::async_trait;

use prayer_common::{PrayerError, PrayerResult, StoredPrayerRecord};

/// Maximum number of records accepted by a single [`PrayerStore::put_batch`].
pub const BATCH_WRITE_LIMIT: usize = 25;

/// Keyed store of per-zone-per-day records.
///
/// Records are keyed by `(zone_id, date)`. Writing a key that already exists
/// replaces the stored record, so replays are idempotent.
#[async_trait]
pub trait PrayerStore: Send + Sync {
    /// Write up to [`BATCH_WRITE_LIMIT`] records atomically: either every
    /// record in the batch is stored or none is.
    async fn put_batch(&self, records: &[StoredPrayerRecord]) -> PrayerResult<()>;

    /// All records stored under `(zone, date)`. Zero or one element.
    async fn query(&self, zone: &str, date: &str) -> PrayerResult<Vec<StoredPrayerRecord>>;

    /// Records of one zone for a month, ordered by date.
    async fn query_month(
        &self,
        zone: &str,
        month: &str,
        year: &str,
    ) -> PrayerResult<Vec<StoredPrayerRecord>>;

    /// Remove records whose expiry (`ttl`, epoch seconds) is at or before
    /// `now_secs`. Returns the number of removed records.
    async fn purge_expired(&self, now_secs: i64) -> PrayerResult<u64>;
}

/// Validate a batch against the write limit and collapse duplicate keys,
/// keeping the last occurrence. Order of first appearance is preserved.
pub fn prepare_batch(records: &[StoredPrayerRecord]) -> PrayerResult<Vec<&StoredPrayerRecord>> {
    if records.len() > BATCH_WRITE_LIMIT {
        return Err(PrayerError::BatchTooLarge {
            size: records.len(),
            limit: BATCH_WRITE_LIMIT,
        });
    }

    let mut slots: HashMap<(&str, &str), usize> = HashMap::new();
    let mut batch: Vec<&StoredPrayerRecord> = Vec::with_capacity(records.len());

    for record in records {
        let key = (record.zone_id.as_str(), record.date.as_str());
        match slots.get(&key) {
            Some(&slot) => batch[slot] = record,
            None => {
                slots.insert(key, batch.len());
                batch.push(record);
            }
        }
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prayer_common::{PrayerInstants, ZoneCode};

    fn record(zone: &str, date: &str, isha: i64) -> StoredPrayerRecord {
        StoredPrayerRecord {
            zone_id: ZoneCode::parse(zone).unwrap(),
            date: date.to_string(),
            day: date[..2].to_string(),
            month: date[3..6].to_string(),
            year: date[7..].to_string(),
            times: PrayerInstants {
                imsak: 0,
                fajr: 0,
                syuruk: 0,
                dhuha: 0,
                dhuhr: 0,
                asr: 0,
                maghrib: 0,
                isha,
            },
            ttl: 0,
        }
    }

    #[test]
    fn test_prepare_batch_rejects_oversized() {
        let records: Vec<_> = (1..=26)
            .map(|d| record("WLY01", &format!("{:02}-Jan-2024", d.min(31)), 0))
            .collect();
        assert!(matches!(
            prepare_batch(&records),
            Err(PrayerError::BatchTooLarge { size: 26, limit: 25 })
        ));
    }

    #[test]
    fn test_prepare_batch_keeps_last_duplicate() {
        let records = vec![
            record("WLY01", "01-Jan-2024", 1),
            record("WLY01", "02-Jan-2024", 2),
            record("WLY01", "01-Jan-2024", 3),
        ];
        let batch = prepare_batch(&records).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].date, "01-Jan-2024");
        assert_eq!(batch[0].times.isha, 3);
        assert_eq!(batch[1].times.isha, 2);
    }

    #[test]
    fn test_prepare_batch_distinguishes_zones() {
        let records = vec![
            record("WLY01", "01-Jan-2024", 1),
            record("SGR01", "01-Jan-2024", 2),
        ];
        assert_eq!(prepare_batch(&records).unwrap().len(), 2);
    }
}
