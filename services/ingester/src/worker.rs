//! Queue worker driving the processor.
//!
//! Every delivered message is processed independently. Success acks the
//! message; failure leaves it unacknowledged so the queue redelivers it after
//! the visibility timeout. A message that keeps failing is parked in the
//! dead-letter stream once it reaches `max_deliveries`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, instrument, warn};

use ingestion::Processor;
use prayer_common::PrayerResult;
use storage::{IngestQueue, PrayerStore, QueueMessage};

/// Worker tuning.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Messages requested per receive
    pub receive_batch: usize,
    /// Deliveries after which a failing message is dead-lettered; 0 disables
    pub max_deliveries: u32,
    pub purge_interval: Duration,
    /// Pause after an empty or failed poll
    pub idle_wait: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            receive_batch: 1,
            max_deliveries: 5,
            purge_interval: Duration::from_secs(3600),
            idle_wait: Duration::from_secs(1),
        }
    }
}

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Processed,
    /// Left unacknowledged for redelivery
    Retrying,
    DeadLettered,
}

/// Running counters exposed on the status endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerStats {
    pub received: u64,
    pub processed: u64,
    pub retrying: u64,
    pub dead_lettered: u64,
    pub records_written: u64,
    pub purged: u64,
    pub last_error: Option<String>,
    pub last_processed_at: Option<chrono::DateTime<Utc>>,
}

pub struct Worker {
    queue: Arc<dyn IngestQueue>,
    store: Arc<dyn PrayerStore>,
    processor: Processor,
    settings: WorkerSettings,
    stats: Arc<Mutex<WorkerStats>>,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn IngestQueue>,
        store: Arc<dyn PrayerStore>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            processor: Processor::new(store.clone()),
            queue,
            store,
            settings,
            stats: Arc::new(Mutex::new(WorkerStats::default())),
        }
    }

    pub fn stats(&self) -> Arc<Mutex<WorkerStats>> {
        self.stats.clone()
    }

    /// Receive one batch and handle every message in it. Returns the
    /// outcomes in delivery order.
    pub async fn poll_once(&self) -> PrayerResult<Vec<MessageOutcome>> {
        let messages = self.queue.receive(self.settings.receive_batch).await?;
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        self.stats.lock().await.received += messages.len() as u64;
        debug!(count = messages.len(), "Received messages");

        let mut outcomes = Vec::with_capacity(messages.len());
        for message in &messages {
            outcomes.push(self.handle(message).await);
        }

        Ok(outcomes)
    }

    #[instrument(skip(self, message), fields(id = %message.id, delivery = message.delivery_count))]
    async fn handle(&self, message: &QueueMessage) -> MessageOutcome {
        let error = match self.processor.process_message(&message.body).await {
            Ok(summary) => match self.queue.ack(message).await {
                Ok(()) => {
                    metrics::counter!("ingester_messages_total", "outcome" => "processed")
                        .increment(1);
                    let mut stats = self.stats.lock().await;
                    stats.processed += 1;
                    stats.records_written += summary.records_written as u64;
                    stats.last_processed_at = Some(Utc::now());
                    return MessageOutcome::Processed;
                }
                // Stored but not acked: redelivery rewrites the same keys
                Err(e) => e.to_string(),
            },
            Err(e) => {
                warn!(error = %e, permanent = e.is_permanent(), "Processing failed");
                e.to_string()
            }
        };

        self.stats.lock().await.last_error = Some(error.clone());

        let exhausted = self.settings.max_deliveries > 0
            && message.delivery_count >= self.settings.max_deliveries;

        if exhausted {
            match self.queue.dead_letter(message, &error).await {
                Ok(()) => {
                    metrics::counter!("ingester_messages_total", "outcome" => "dead_lettered")
                        .increment(1);
                    error!(error = %error, "Message dead-lettered after repeated failures");
                    self.stats.lock().await.dead_lettered += 1;
                    return MessageOutcome::DeadLettered;
                }
                Err(e) => error!(error = %e, "Failed to dead-letter message"),
            }
        }

        metrics::counter!("ingester_messages_total", "outcome" => "retrying").increment(1);
        self.stats.lock().await.retrying += 1;
        MessageOutcome::Retrying
    }

    /// Remove stored records past their expiry.
    pub async fn purge_expired(&self) -> PrayerResult<u64> {
        let removed = self.store.purge_expired(Utc::now().timestamp()).await?;
        if removed > 0 {
            info!(removed, "Purged expired prayer times");
        }
        self.stats.lock().await.purged += removed;
        Ok(removed)
    }

    /// Poll until the queue has nothing to deliver.
    pub async fn drain(&self) -> PrayerResult<u64> {
        let mut handled = 0;
        loop {
            let outcomes = self.poll_once().await?;
            if outcomes.is_empty() {
                return Ok(handled);
            }
            handled += outcomes.len() as u64;
        }
    }

    /// Poll continuously until shutdown, purging on the configured interval.
    pub async fn run_forever(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut last_purge: Option<Instant> = None;

        loop {
            let purge_due = last_purge.map_or(true, |t| t.elapsed() >= self.settings.purge_interval);
            if purge_due {
                if let Err(e) = self.purge_expired().await {
                    warn!(error = %e, "Expiry purge failed");
                }
                last_purge = Some(Instant::now());
            }

            let idle = tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down worker");
                    break;
                }
                polled = self.poll_once() => match polled {
                    Ok(outcomes) => outcomes.is_empty(),
                    Err(e) => {
                        error!(error = %e, "Receive failed");
                        true
                    }
                }
            };

            if idle {
                tokio::time::sleep(self.settings.idle_wait).await;
            }
        }
    }
}
