//! Prayer-time ingestion library.
//!
//! Turns one upstream month response into stored per-day records.
//!
//! # Architecture
//!
//! This crate is used by the `ingester` service, which feeds it queue
//! messages. It handles:
//!
//! - Decoding the queued JSON body
//! - Converting local wall-clock times to UTC instants
//! - Computing per-record expiry
//! - Chunked, atomic batch upserts into the prayer-time store

pub mod error;
mod processor;

// Re-exports
pub use error::{IngestionError, Result};
pub use processor::{to_stored_record, ProcessSummary, Processor};
