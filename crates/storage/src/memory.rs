//! In-process store and queue used for local runs and tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use prayer_common::{PrayerError, PrayerResult, StoredPrayerRecord};

use crate::queue::{is_expired, IngestQueue, QueueMessage, QueueSettings};
use crate::store::{prepare_batch, PrayerStore};

type RecordKey = (String, String);

/// Prayer-time store backed by an ordered map.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<RecordKey, StoredPrayerRecord>>,
    batch_sizes: Mutex<Vec<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Sizes of every batch written so far, in order.
    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().await.clone()
    }

    /// Snapshot of all stored records ordered by key.
    pub async fn records(&self) -> Vec<StoredPrayerRecord> {
        self.records.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl PrayerStore for MemoryStore {
    async fn put_batch(&self, records: &[StoredPrayerRecord]) -> PrayerResult<()> {
        let batch = prepare_batch(records)?;

        let mut stored = self.records.lock().await;
        for record in &batch {
            let key = (record.zone_id.to_string(), record.date.clone());
            stored.insert(key, (*record).clone());
        }
        self.batch_sizes.lock().await.push(batch.len());

        Ok(())
    }

    async fn query(&self, zone: &str, date: &str) -> PrayerResult<Vec<StoredPrayerRecord>> {
        let stored = self.records.lock().await;
        Ok(stored
            .get(&(zone.to_string(), date.to_string()))
            .cloned()
            .into_iter()
            .collect())
    }

    async fn query_month(
        &self,
        zone: &str,
        month: &str,
        year: &str,
    ) -> PrayerResult<Vec<StoredPrayerRecord>> {
        let stored = self.records.lock().await;
        let mut matches: Vec<StoredPrayerRecord> = stored
            .values()
            .filter(|r| r.zone_id.as_str() == zone && r.month == month && r.year == year)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.day.cmp(&b.day));
        Ok(matches)
    }

    async fn purge_expired(&self, now_secs: i64) -> PrayerResult<u64> {
        let mut stored = self.records.lock().await;
        let before = stored.len();
        stored.retain(|_, record| record.ttl > now_secs);
        Ok((before - stored.len()) as u64)
    }
}

/// A message that was moved to the dead-letter list.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub message: QueueMessage,
    pub reason: String,
}

struct InFlight {
    message: QueueMessage,
    visible_at: Instant,
}

#[derive(Default)]
struct QueueState {
    next_id: u64,
    ready: VecDeque<QueueMessage>,
    in_flight: HashMap<String, InFlight>,
    dead: Vec<DeadLetter>,
}

/// Ingestion queue with the same visibility semantics as the Redis queue.
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    settings: QueueSettings,
}

impl MemoryQueue {
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            settings,
        }
    }

    /// Messages currently moved to the dead-letter list.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead.clone()
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(QueueSettings::default())
    }
}

#[async_trait]
impl IngestQueue for MemoryQueue {
    async fn send(&self, body: &str) -> PrayerResult<String> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = format!("mem-{}", state.next_id);

        state.ready.push_back(QueueMessage {
            id: id.clone(),
            body: body.to_string(),
            delivery_count: 0,
            enqueued_at: Utc::now(),
        });

        Ok(id)
    }

    async fn receive(&self, max_messages: usize) -> PrayerResult<Vec<QueueMessage>> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let wall_now = Utc::now();

        // Lapsed visibility makes a message receivable again, ahead of new ones
        let mut lapsed: Vec<(chrono::DateTime<Utc>, String)> = state
            .in_flight
            .values()
            .filter(|f| f.visible_at <= now)
            .map(|f| (f.message.enqueued_at, f.message.id.clone()))
            .collect();
        lapsed.sort();
        for (_, id) in lapsed.into_iter().rev() {
            if let Some(flight) = state.in_flight.remove(&id) {
                state.ready.push_front(flight.message);
            }
        }

        let mut messages = Vec::new();
        while messages.len() < max_messages.max(1) {
            let Some(mut message) = state.ready.pop_front() else {
                break;
            };
            if is_expired(&message, wall_now, self.settings.retention) {
                continue;
            }

            message.delivery_count += 1;
            state.in_flight.insert(
                message.id.clone(),
                InFlight {
                    message: message.clone(),
                    visible_at: now + self.settings.visibility_timeout,
                },
            );
            messages.push(message);
        }

        Ok(messages)
    }

    async fn ack(&self, message: &QueueMessage) -> PrayerResult<()> {
        let mut state = self.state.lock().await;
        match state.in_flight.remove(&message.id) {
            Some(_) => Ok(()),
            None => Err(PrayerError::QueueError(format!(
                "Message {} is not in flight",
                message.id
            ))),
        }
    }

    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> PrayerResult<()> {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&message.id);
        state.dead.push(DeadLetter {
            message: message.clone(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn depth(&self) -> PrayerResult<u64> {
        let state = self.state.lock().await;
        Ok((state.ready.len() + state.in_flight.len()) as u64)
    }
}
