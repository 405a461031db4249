//! Storage abstractions for prayer-times services.
//!
//! Provides unified interfaces for:
//! - PostgreSQL for the prayer-time table (upsert by zone and date)
//! - Redis Streams for the ingestion queue
//! - In-memory equivalents of both for local runs and tests

pub mod memory;
pub mod postgres;
pub mod queue;
pub mod store;

pub use memory::{MemoryQueue, MemoryStore};
pub use postgres::PgPrayerStore;
pub use queue::{IngestQueue, QueueMessage, QueueSettings, RedisStreamQueue};
pub use store::{PrayerStore, BATCH_WRITE_LIMIT};
