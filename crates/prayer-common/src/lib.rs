//! Common types and utilities shared across all prayer-times services.

pub mod error;
pub mod record;
pub mod time;
pub mod zone;

pub use error::{PrayerError, PrayerResult};
pub use record::{
    PrayerInstants, PrayerName, StoredPrayerRecord, UpstreamDailyRecord, UpstreamMonthResponse,
    UPSTREAM_OK_STATUS,
};
pub use time::{compute_expiry, normalize_record, to_absolute_instant, REGION_UTC_OFFSET_HOURS};
pub use zone::{ZoneCode, ALL_ZONES};
