//! Shared test utilities for the prayer-times workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Upstream payload generators (daily records and full months)
//! - Canned provider responses for HTTP mocks
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../../crates/test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{month_response, fixtures};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

#[doc(hidden)]
pub use prayer_common::time::local_time_of as __local_time_of;

/// Assert that an epoch-millisecond instant reads as the given region-local
/// `HH:MM`.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_local_time;
///
/// assert_local_time!(record.times.fajr, "06:03");
/// ```
#[macro_export]
macro_rules! assert_local_time {
    ($instant:expr, $expected:expr) => {{
        let instant: i64 = $instant;
        match $crate::__local_time_of(instant) {
            Some(actual) => assert_eq!(
                actual, $expected,
                "instant {} reads as {} locally, expected {}",
                instant, actual, $expected
            ),
            None => panic!("instant {} is out of range", instant),
        }
    }};
}
