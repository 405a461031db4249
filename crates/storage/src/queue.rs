//! Redis Streams-based ingestion queue.
//!
//! Delivery is at-least-once. A received message stays pending in the
//! consumer group until it is acknowledged; once it has been pending longer
//! than the visibility timeout it becomes receivable again. Messages older
//! than the retention period are discarded instead of redelivered.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::MultiplexedConnection, streams::*, AsyncCommands, Client};
use tracing::warn;

use prayer_common::{PrayerError, PrayerResult};

const STREAM_KEY: &str = "prayer:ingest";
const DEAD_LETTER_KEY: &str = "prayer:ingest:dead";
const CONSUMER_GROUP: &str = "processors";
const BODY_FIELD: &str = "body";

/// A message handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    pub body: String,
    /// How many times this message has been delivered, including this one
    pub delivery_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

/// Timing parameters shared by queue implementations.
#[derive(Debug, Clone, Copy)]
pub struct QueueSettings {
    pub visibility_timeout: Duration,
    pub retention: Duration,
    /// How long a receive may wait for new messages
    pub receive_wait: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(180),
            retention: Duration::from_secs(24 * 3600),
            receive_wait: Duration::from_secs(5),
        }
    }
}

/// Durable FIFO-ish buffer between the fetcher and the processor.
#[async_trait]
pub trait IngestQueue: Send + Sync {
    /// Enqueue a message body. Returns the message id.
    async fn send(&self, body: &str) -> PrayerResult<String>;

    /// Receive up to `max_messages` messages. Received messages become
    /// invisible to other receivers until the visibility timeout passes.
    async fn receive(&self, max_messages: usize) -> PrayerResult<Vec<QueueMessage>>;

    /// Acknowledge a message so it is never delivered again.
    async fn ack(&self, message: &QueueMessage) -> PrayerResult<()>;

    /// Move a message to the dead-letter store and acknowledge it.
    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> PrayerResult<()>;

    /// Number of messages held by the queue, delivered or not.
    async fn depth(&self) -> PrayerResult<u64>;
}

/// Redis Streams ingestion queue.
pub struct RedisStreamQueue {
    conn: MultiplexedConnection,
    consumer: String,
    settings: QueueSettings,
}

impl RedisStreamQueue {
    /// Connect to Redis and initialize the stream.
    pub async fn connect(
        redis_url: &str,
        consumer: impl Into<String>,
        settings: QueueSettings,
    ) -> PrayerResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| PrayerError::QueueError(format!("Redis connection failed: {}", e)))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PrayerError::QueueError(format!("Redis connection failed: {}", e)))?;

        // Create consumer group if it doesn't exist
        let _: Result<(), _> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(STREAM_KEY)
            .arg(CONSUMER_GROUP)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        Ok(Self {
            conn,
            consumer: consumer.into(),
            settings,
        })
    }

    /// Claim messages whose visibility timeout has lapsed.
    async fn reclaim_stale(&self, max_messages: usize) -> PrayerResult<Vec<QueueMessage>> {
        let mut conn = self.conn.clone();
        let idle_ms = self.settings.visibility_timeout.as_millis() as usize;

        // Only entries idle past the visibility timeout
        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(STREAM_KEY)
            .arg(CONSUMER_GROUP)
            .arg("IDLE")
            .arg(idle_ms)
            .arg("-")
            .arg("+")
            .arg(max_messages)
            .query_async(&mut conn)
            .await
            .map_err(|e| PrayerError::QueueError(format!("XPENDING failed: {}", e)))?;

        let stale = stale_entries(&pending.ids, idle_ms);
        if stale.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = stale.iter().map(|s| s.id.as_str()).collect();
        let claimed: StreamClaimReply = conn
            .xclaim(STREAM_KEY, CONSUMER_GROUP, &self.consumer, idle_ms, &ids[..])
            .await
            .map_err(|e| PrayerError::QueueError(format!("XCLAIM failed: {}", e)))?;

        claimed
            .ids
            .iter()
            .map(|entry| to_message(entry, reclaimed_delivery_count(&stale, &entry.id)))
            .collect()
    }

    /// Read entries never delivered to the group.
    async fn read_new(&self, count: usize, block: bool) -> PrayerResult<Vec<QueueMessage>> {
        let mut opts = StreamReadOptions::default()
            .group(CONSUMER_GROUP, &self.consumer)
            .count(count);
        if block {
            opts = opts.block(self.settings.receive_wait.as_millis() as usize);
        }

        let mut conn = self.conn.clone();
        let result: Option<StreamReadReply> = conn
            .xread_options(&[STREAM_KEY], &[">"], &opts)
            .await
            .map_err(|e| PrayerError::QueueError(format!("Read failed: {}", e)))?;

        result
            .map(|r| r.keys)
            .unwrap_or_default()
            .iter()
            .flat_map(|key| key.ids.iter())
            .map(|entry| to_message(entry, 1))
            .collect()
    }

    async fn remove(&self, id: &str) -> PrayerResult<()> {
        let mut conn = self.conn.clone();

        let _: i64 = conn
            .xack(STREAM_KEY, CONSUMER_GROUP, &[id])
            .await
            .map_err(|e| PrayerError::QueueError(format!("XACK failed: {}", e)))?;
        let _: i64 = conn
            .xdel(STREAM_KEY, &[id])
            .await
            .map_err(|e| PrayerError::QueueError(format!("XDEL failed: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl IngestQueue for RedisStreamQueue {
    async fn send(&self, body: &str) -> PrayerResult<String> {
        let mut conn = self.conn.clone();

        let entry_id: String = redis::cmd("XADD")
            .arg(STREAM_KEY)
            .arg("*")
            .arg(BODY_FIELD)
            .arg(body)
            .query_async(&mut conn)
            .await
            .map_err(|e| PrayerError::QueueError(format!("Enqueue failed: {}", e)))?;

        Ok(entry_id)
    }

    async fn receive(&self, max_messages: usize) -> PrayerResult<Vec<QueueMessage>> {
        let max_messages = max_messages.max(1);

        loop {
            let mut messages = self.reclaim_stale(max_messages).await?;
            if messages.len() < max_messages {
                let fresh = self
                    .read_new(max_messages - messages.len(), messages.is_empty())
                    .await?;
                messages.extend(fresh);
            }
            if messages.is_empty() {
                return Ok(messages);
            }

            let (live, expired) = split_expired(messages, Utc::now(), self.settings.retention);
            for message in &expired {
                warn!(id = %message.id, "Discarding message past retention");
                self.remove(&message.id).await?;
            }
            if !live.is_empty() {
                return Ok(live);
            }
        }
    }

    async fn ack(&self, message: &QueueMessage) -> PrayerResult<()> {
        self.remove(&message.id).await
    }

    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> PrayerResult<()> {
        let mut conn = self.conn.clone();

        let _: String = redis::cmd("XADD")
            .arg(DEAD_LETTER_KEY)
            .arg("*")
            .arg(BODY_FIELD)
            .arg(&message.body)
            .arg("source_id")
            .arg(&message.id)
            .arg("deliveries")
            .arg(message.delivery_count)
            .arg("reason")
            .arg(reason)
            .query_async(&mut conn)
            .await
            .map_err(|e| PrayerError::QueueError(format!("Dead-letter failed: {}", e)))?;

        self.remove(&message.id).await
    }

    async fn depth(&self) -> PrayerResult<u64> {
        let mut conn = self.conn.clone();

        let length: u64 = conn
            .xlen(STREAM_KEY)
            .await
            .map_err(|e| PrayerError::QueueError(format!("XLEN failed: {}", e)))?;

        Ok(length)
    }
}

fn to_message(entry: &StreamId, delivery_count: u32) -> PrayerResult<QueueMessage> {
    let body: String = entry
        .get(BODY_FIELD)
        .ok_or_else(|| PrayerError::QueueError(format!("Entry {} has no body", entry.id)))?;

    Ok(QueueMessage {
        id: entry.id.clone(),
        body,
        delivery_count,
        enqueued_at: enqueued_at(&entry.id),
    })
}

/// Stream entry ids are `<unix-ms>-<seq>`.
fn enqueued_at(entry_id: &str) -> DateTime<Utc> {
    entry_id
        .split('-')
        .next()
        .and_then(|ms| ms.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

/// A pending entry due for redelivery.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StaleEntry {
    id: String,
    /// Delivery count the entry carries once claimed
    delivery_count: u32,
}

fn stale_entries(pending: &[StreamPendingId], idle_ms: usize) -> Vec<StaleEntry> {
    pending
        .iter()
        .filter(|p| p.last_delivered_ms >= idle_ms)
        .map(|p| StaleEntry {
            id: p.id.clone(),
            delivery_count: u32::try_from(p.times_delivered)
                .unwrap_or(u32::MAX)
                .saturating_add(1),
        })
        .collect()
}

fn reclaimed_delivery_count(stale: &[StaleEntry], id: &str) -> u32 {
    stale
        .iter()
        .find(|s| s.id == id)
        .map(|s| s.delivery_count)
        .unwrap_or(2)
}

/// Split messages into `(live, expired)` by age against `retention`.
fn split_expired(
    messages: Vec<QueueMessage>,
    now: DateTime<Utc>,
    retention: Duration,
) -> (Vec<QueueMessage>, Vec<QueueMessage>) {
    messages
        .into_iter()
        .partition(|message| !is_expired(message, now, retention))
}

pub(crate) fn is_expired(message: &QueueMessage, now: DateTime<Utc>, retention: Duration) -> bool {
    let age = now.signed_duration_since(message.enqueued_at);
    age.to_std().map(|age| age > retention).unwrap_or(false)
}
