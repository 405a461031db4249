//! HTTP request handlers for the prayer-times API.

pub mod health;
pub mod prayer_times;
