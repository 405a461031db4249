//! Generators for upstream payloads.

use chrono::{Datelike, Duration, NaiveDate};

use prayer_common::{UpstreamDailyRecord, UpstreamMonthResponse, ZoneCode, UPSTREAM_OK_STATUS};

use crate::fixtures::times;

/// A daily record for `date` with the fixture times.
pub fn daily_record(date: NaiveDate) -> UpstreamDailyRecord {
    UpstreamDailyRecord {
        hijri: String::new(),
        date: date.format("%d-%b-%Y").to_string(),
        day: date.format("%A").to_string(),
        imsak: times::IMSAK.to_string(),
        fajr: times::FAJR.to_string(),
        syuruk: times::SYURUK.to_string(),
        dhuha: times::DHUHA.to_string(),
        dhuhr: times::DHUHR.to_string(),
        asr: times::ASR.to_string(),
        maghrib: times::MAGHRIB.to_string(),
        isha: times::ISHA.to_string(),
    }
}

/// `days` consecutive daily records starting at `start`.
pub fn daily_records(start: NaiveDate, days: usize) -> Vec<UpstreamDailyRecord> {
    (0..days)
        .map(|offset| daily_record(start + Duration::days(offset as i64)))
        .collect()
}

/// A successful response covering the whole of `year`-`month`.
///
/// # Panics
///
/// Panics if `zone` is not a well-formed zone code or the month is invalid.
pub fn month_response(zone: &str, year: i32, month: u32) -> UpstreamMonthResponse {
    let start = NaiveDate::from_ymd_opt(year, month, 1).expect("valid month");
    let days = days_in_month(start);
    response_with_records(zone, daily_records(start, days))
}

/// A successful response carrying exactly `records`.
pub fn response_with_records(zone: &str, records: Vec<UpstreamDailyRecord>) -> UpstreamMonthResponse {
    UpstreamMonthResponse {
        prayer_time: records,
        status: UPSTREAM_OK_STATUS.to_string(),
        server_time: "2024-01-01 00:00:05".to_string(),
        period_type: "duration".to_string(),
        lang: "ms_my".to_string(),
        zone: ZoneCode::parse(zone).expect("valid zone code"),
    }
}

/// JSON body for a whole-month response, as the provider sends it.
pub fn month_response_json(zone: &str, year: i32, month: u32) -> String {
    serde_json::to_string(&month_response(zone, year, month)).expect("serializable response")
}

fn days_in_month(first: NaiveDate) -> usize {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|next| (next - first).num_days() as usize)
        .unwrap_or(31)
}
