//! Upstream payloads and the normalized stored record.

use serde::{Deserialize, Serialize};

use crate::zone::ZoneCode;

/// Status marker the provider sets on a successful response.
pub const UPSTREAM_OK_STATUS: &str = "OK!";

/// The eight named times in a daily schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerName {
    Imsak,
    Fajr,
    Syuruk,
    Dhuha,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerName {
    /// All names in chronological order within a day.
    pub const ALL: [PrayerName; 8] = [
        PrayerName::Imsak,
        PrayerName::Fajr,
        PrayerName::Syuruk,
        PrayerName::Dhuha,
        PrayerName::Dhuhr,
        PrayerName::Asr,
        PrayerName::Maghrib,
        PrayerName::Isha,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imsak => "imsak",
            Self::Fajr => "fajr",
            Self::Syuruk => "syuruk",
            Self::Dhuha => "dhuha",
            Self::Dhuhr => "dhuhr",
            Self::Asr => "asr",
            Self::Maghrib => "maghrib",
            Self::Isha => "isha",
        }
    }
}

/// One day's schedule for one zone, as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamDailyRecord {
    #[serde(default)]
    pub hijri: String,
    /// Gregorian date, `DD-MMM-YYYY`
    pub date: String,
    #[serde(default)]
    pub day: String,
    pub imsak: String,
    pub fajr: String,
    pub syuruk: String,
    pub dhuha: String,
    pub dhuhr: String,
    pub asr: String,
    pub maghrib: String,
    pub isha: String,
}

impl UpstreamDailyRecord {
    /// Local time-of-day string for a named prayer.
    pub fn time_of(&self, name: PrayerName) -> &str {
        match name {
            PrayerName::Imsak => &self.imsak,
            PrayerName::Fajr => &self.fajr,
            PrayerName::Syuruk => &self.syuruk,
            PrayerName::Dhuha => &self.dhuha,
            PrayerName::Dhuhr => &self.dhuhr,
            PrayerName::Asr => &self.asr,
            PrayerName::Maghrib => &self.maghrib,
            PrayerName::Isha => &self.isha,
        }
    }
}

/// A month of schedules for one zone. This is the queue message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamMonthResponse {
    #[serde(default)]
    pub prayer_time: Vec<UpstreamDailyRecord>,
    pub status: String,
    #[serde(default)]
    pub server_time: String,
    #[serde(default)]
    pub period_type: String,
    #[serde(default)]
    pub lang: String,
    pub zone: ZoneCode,
}

impl UpstreamMonthResponse {
    pub fn is_ok(&self) -> bool {
        self.status == UPSTREAM_OK_STATUS
    }
}

/// Absolute UTC instants (epoch milliseconds) for each named prayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerInstants {
    pub imsak: i64,
    pub fajr: i64,
    pub syuruk: i64,
    pub dhuha: i64,
    pub dhuhr: i64,
    pub asr: i64,
    pub maghrib: i64,
    pub isha: i64,
}

impl PrayerInstants {
    pub fn get(&self, name: PrayerName) -> i64 {
        match name {
            PrayerName::Imsak => self.imsak,
            PrayerName::Fajr => self.fajr,
            PrayerName::Syuruk => self.syuruk,
            PrayerName::Dhuha => self.dhuha,
            PrayerName::Dhuhr => self.dhuhr,
            PrayerName::Asr => self.asr,
            PrayerName::Maghrib => self.maghrib,
            PrayerName::Isha => self.isha,
        }
    }

    /// `(name, instant)` pairs in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = (PrayerName, i64)> + '_ {
        PrayerName::ALL.into_iter().map(move |name| (name, self.get(name)))
    }
}

/// The normalized, persisted per-zone-per-day record.
///
/// Keyed by `(zone_id, date)`; a later write for the same key replaces the
/// earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPrayerRecord {
    pub zone_id: ZoneCode,
    /// Sort key, same `DD-MMM-YYYY` string as upstream
    pub date: String,
    pub day: String,
    pub month: String,
    pub year: String,
    #[serde(flatten)]
    pub times: PrayerInstants,
    /// Expiry instant in epoch seconds
    pub ttl: i64,
}

impl StoredPrayerRecord {
    /// Primary key of the record.
    pub fn key(&self) -> (&ZoneCode, &str) {
        (&self.zone_id, &self.date)
    }
}
