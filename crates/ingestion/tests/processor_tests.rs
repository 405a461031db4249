//! Processor behaviour against in-memory and failing stores.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use ingestion::{IngestionError, Processor};
use prayer_common::{PrayerError, PrayerResult, StoredPrayerRecord};
use storage::{MemoryStore, PrayerStore};
use test_utils::{daily_records, month_response, response_with_records};

/// Store that fails the `fail_on`-th call to `put_batch` (1-based) and
/// records every attempted batch.
struct FlakyStore {
    inner: MemoryStore,
    calls: AtomicUsize,
    fail_on: usize,
    attempted: std::sync::Mutex<Vec<Vec<String>>>,
}

impl FlakyStore {
    fn new(fail_on: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            calls: AtomicUsize::new(0),
            fail_on,
            attempted: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn attempted_first_dates(&self) -> Vec<String> {
        self.attempted
            .lock()
            .unwrap()
            .iter()
            .map(|dates| dates[0].clone())
            .collect()
    }
}

#[async_trait]
impl PrayerStore for FlakyStore {
    async fn put_batch(&self, records: &[StoredPrayerRecord]) -> PrayerResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.attempted
            .lock()
            .unwrap()
            .push(records.iter().map(|r| r.date.clone()).collect());

        if call == self.fail_on {
            return Err(PrayerError::DatabaseError("throttled".to_string()));
        }
        self.inner.put_batch(records).await
    }

    async fn query(&self, zone: &str, date: &str) -> PrayerResult<Vec<StoredPrayerRecord>> {
        self.inner.query(zone, date).await
    }

    async fn query_month(
        &self,
        zone: &str,
        month: &str,
        year: &str,
    ) -> PrayerResult<Vec<StoredPrayerRecord>> {
        self.inner.query_month(zone, month, year).await
    }

    async fn purge_expired(&self, now_secs: i64) -> PrayerResult<u64> {
        self.inner.purge_expired(now_secs).await
    }
}

#[tokio::test]
async fn test_full_month_splits_into_two_batches() {
    let store = Arc::new(MemoryStore::new());
    let processor = Processor::new(store.clone());

    let summary = processor
        .process(&month_response("WLY01", 2024, 1))
        .await
        .unwrap();

    assert_eq!(summary.batches_written, 2);
    assert_eq!(summary.records_written, 31);
    assert_eq!(store.batch_sizes().await, vec![25, 6]);
    assert_eq!(store.len().await, 31);

    let jan_31 = store.query("WLY01", "31-Jan-2024").await.unwrap();
    assert_eq!(jan_31.len(), 1);
    assert_eq!(jan_31[0].month, "Jan");
    assert_eq!(jan_31[0].year, "2024");
}

#[tokio::test]
async fn test_second_batch_failure_keeps_first_and_does_not_resubmit() {
    let store = Arc::new(FlakyStore::new(2));
    let processor = Processor::new(store.clone());

    let err = processor
        .process(&month_response("WLY01", 2024, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestionError::BatchWrite { batch: 2, total: 2, .. }));
    assert!(!err.is_permanent());
    assert_eq!(
        store.attempted_first_dates(),
        vec!["01-Jan-2024".to_string(), "26-Jan-2024".to_string()]
    );
    assert_eq!(store.inner.len().await, 25);
}

#[tokio::test]
async fn test_replay_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let processor = Processor::new(store.clone());
    let response = month_response("SGR01", 2024, 2);

    processor.process(&response).await.unwrap();
    let first = store.records().await;

    processor.process(&response).await.unwrap();
    assert_eq!(store.records().await, first);
    assert_eq!(first.len(), 29);
}

#[tokio::test]
async fn test_empty_response_is_noop() {
    let store = Arc::new(MemoryStore::new());
    let processor = Processor::new(store.clone());

    let summary = processor
        .process(&response_with_records("WLY01", Vec::new()))
        .await
        .unwrap();

    assert_eq!(summary.batches_written, 0);
    assert!(store.batch_sizes().await.is_empty());
}

#[tokio::test]
async fn test_malformed_record_aborts_its_batch() {
    let store = Arc::new(MemoryStore::new());
    let processor = Processor::new(store.clone());

    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut records = daily_records(start, 31);
    records[27].dhuhr = "noon".to_string();

    let err = processor
        .process(&response_with_records("WLY01", records))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestionError::Conversion { ref date, .. } if date == "28-Jan-2024"));
    assert_eq!(store.batch_sizes().await, vec![25]);
}

#[tokio::test]
async fn test_month_and_year_follow_first_record() {
    let store = Arc::new(MemoryStore::new());
    let processor = Processor::new(store.clone());

    // A window that spills into the next month keeps the first month's partition
    let start = NaiveDate::from_ymd_opt(2024, 1, 30).unwrap();
    processor
        .process(&response_with_records("WLY01", daily_records(start, 3)))
        .await
        .unwrap();

    let feb_1 = store.query("WLY01", "01-Feb-2024").await.unwrap();
    assert_eq!(feb_1[0].month, "Jan");
    assert_eq!(feb_1[0].day, "01");
    assert_eq!(store.query_month("WLY01", "Jan", "2024").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_process_message_rejects_bad_json() {
    let processor = Processor::new(Arc::new(MemoryStore::new()));

    let err = processor.process_message("{not json").await.unwrap_err();
    assert!(matches!(err, IngestionError::Decode(_)));
    assert!(err.is_permanent());

    let ok = processor
        .process_message(test_utils::SAMPLE_RESPONSE_JSON)
        .await
        .unwrap();
    assert_eq!(ok.records_written, 1);
}
