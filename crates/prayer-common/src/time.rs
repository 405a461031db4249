//! Conversion of provider date/time strings into absolute instants.
//!
//! The provider publishes wall-clock times for a single region whose UTC
//! offset never changes, so conversion uses the fixed
//! [`REGION_UTC_OFFSET_HOURS`] instead of a timezone database. This is a
//! policy of the pipeline, not a general timezone converter.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{PrayerError, PrayerResult};
use crate::record::{PrayerInstants, PrayerName, UpstreamDailyRecord};

/// UTC offset of the target region (UTC+8, no daylight saving).
pub const REGION_UTC_OFFSET_HOURS: i64 = 8;

/// Hours added to a record's midnight to obtain its expiry.
pub const EXPIRY_OFFSET_HOURS: i64 = 12;

/// Provider date format, e.g. `15-Jan-2024`.
pub const DATE_FORMAT: &str = "%d-%b-%Y";

/// Parse a `DD-MMM-YYYY` date.
pub fn parse_date(date: &str) -> PrayerResult<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
        .map_err(|_| PrayerError::InvalidDate(date.to_string()))
}

/// Parse a local time of day, `HH:MM:SS` or `HH:MM`.
pub fn parse_local_time(time: &str) -> PrayerResult<NaiveTime> {
    let trimmed = time.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| PrayerError::InvalidTime(time.to_string()))
}

/// Split a `DD-MMM-YYYY` date into its `(day, month, year)` text segments.
pub fn split_date(date: &str) -> PrayerResult<(String, String, String)> {
    let mut parts = date.trim().split('-');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(day), Some(month), Some(year), None) => {
            Ok((day.to_string(), month.to_string(), year.to_string()))
        }
        _ => Err(PrayerError::InvalidDate(date.to_string())),
    }
}

/// Expiry marker for a record: midnight of `date` plus 12 hours, in epoch
/// seconds. Midnight is taken on the UTC clock.
pub fn compute_expiry(date: &str) -> PrayerResult<i64> {
    let midnight = parse_date(date)?.and_time(NaiveTime::default());
    let expiry = midnight.and_utc() + Duration::hours(EXPIRY_OFFSET_HOURS);
    Ok(expiry.timestamp())
}

/// Convert a local date and time of day into a UTC instant in epoch
/// milliseconds.
pub fn to_absolute_instant(date: &str, local_time: &str) -> PrayerResult<i64> {
    let local = NaiveDateTime::new(parse_date(date)?, parse_local_time(local_time)?);
    let utc = local.and_utc() - Duration::hours(REGION_UTC_OFFSET_HOURS);
    Ok(utc.timestamp_millis())
}

/// Convert all eight named times of a daily record.
pub fn normalize_record(record: &UpstreamDailyRecord) -> PrayerResult<PrayerInstants> {
    let at = |name: PrayerName| to_absolute_instant(&record.date, record.time_of(name));

    Ok(PrayerInstants {
        imsak: at(PrayerName::Imsak)?,
        fajr: at(PrayerName::Fajr)?,
        syuruk: at(PrayerName::Syuruk)?,
        dhuha: at(PrayerName::Dhuha)?,
        dhuhr: at(PrayerName::Dhuhr)?,
        asr: at(PrayerName::Asr)?,
        maghrib: at(PrayerName::Maghrib)?,
        isha: at(PrayerName::Isha)?,
    })
}

/// Region-local `HH:MM` for an instant produced by [`to_absolute_instant`].
pub fn local_time_of(instant_ms: i64) -> Option<String> {
    let utc = DateTime::from_timestamp_millis(instant_ms)?;
    let local = utc + Duration::hours(REGION_UTC_OFFSET_HOURS);
    Some(local.format("%H:%M").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 15-Jan-2024 00:00:00 on the UTC clock
    const MIDNIGHT_15_JAN_2024: i64 = 1_705_276_800;

    fn record(date: &str) -> UpstreamDailyRecord {
        UpstreamDailyRecord {
            hijri: "1445-07-03".to_string(),
            date: date.to_string(),
            day: "Monday".to_string(),
            imsak: "05:53:00".to_string(),
            fajr: "06:03:00".to_string(),
            syuruk: "07:16:00".to_string(),
            dhuha: "07:43:00".to_string(),
            dhuhr: "13:21:00".to_string(),
            asr: "16:44:00".to_string(),
            maghrib: "19:22:00".to_string(),
            isha: "20:36:00".to_string(),
        }
    }

    #[test]
    fn test_absolute_instant_subtracts_region_offset() {
        let instant = to_absolute_instant("15-Jan-2024", "05:45").unwrap();
        let expected = (MIDNIGHT_15_JAN_2024 + 5 * 3600 + 45 * 60 - 8 * 3600) * 1000;
        assert_eq!(instant, expected);
    }

    #[test]
    fn test_round_trip_local_time() {
        let instant = to_absolute_instant("15-Jan-2024", "05:45").unwrap();
        assert_eq!(local_time_of(instant).as_deref(), Some("05:45"));
    }

    #[test]
    fn test_seconds_form_matches_minutes_form() {
        assert_eq!(
            to_absolute_instant("15-Jan-2024", "05:45:00").unwrap(),
            to_absolute_instant("15-Jan-2024", "05:45").unwrap()
        );
    }

    #[test]
    fn test_early_morning_crosses_to_previous_utc_day() {
        let instant = to_absolute_instant("01-Mar-2024", "05:00").unwrap();
        let utc = DateTime::from_timestamp_millis(instant).unwrap();
        assert_eq!(utc.format("%Y-%m-%d %H:%M").to_string(), "2024-02-29 21:00");
    }

    #[test]
    fn test_expiry_is_midnight_plus_twelve_hours() {
        assert_eq!(
            compute_expiry("15-Jan-2024").unwrap(),
            MIDNIGHT_15_JAN_2024 + 12 * 3600
        );
    }

    #[test]
    fn test_expiry_follows_daytime_prayers() {
        let expiry_ms = compute_expiry("15-Jan-2024").unwrap() * 1000;
        let instants = normalize_record(&record("15-Jan-2024")).unwrap();

        for name in [
            PrayerName::Imsak,
            PrayerName::Fajr,
            PrayerName::Syuruk,
            PrayerName::Dhuha,
            PrayerName::Dhuhr,
            PrayerName::Asr,
            PrayerName::Maghrib,
        ] {
            assert!(expiry_ms > instants.get(name), "{} after expiry", name.as_str());
        }
    }

    #[test]
    fn test_normalize_record_covers_all_names() {
        let daily = record("15-Jan-2024");
        let instants = normalize_record(&daily).unwrap();

        for (name, instant) in instants.iter() {
            assert_eq!(
                local_time_of(instant).unwrap(),
                &daily.time_of(name)[..5],
                "{}",
                name.as_str()
            );
        }

        let ordered: Vec<i64> = instants.iter().map(|(_, v)| v).collect();
        assert!(ordered.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_malformed_inputs_are_errors() {
        assert!(matches!(
            to_absolute_instant("2024-01-15", "05:45"),
            Err(PrayerError::InvalidDate(_))
        ));
        assert!(matches!(
            to_absolute_instant("15-Jan-2024", "5.45am"),
            Err(PrayerError::InvalidTime(_))
        ));
        assert!(matches!(compute_expiry("31-Feb-2024"), Err(PrayerError::InvalidDate(_))));

        let mut bad = record("15-Jan-2024");
        bad.isha = "".to_string();
        assert!(normalize_record(&bad).is_err());
    }

    #[test]
    fn test_split_date() {
        let (day, month, year) = split_date("15-Jan-2024").unwrap();
        assert_eq!((day.as_str(), month.as_str(), year.as_str()), ("15", "Jan", "2024"));
        assert!(split_date("15/Jan/2024").is_err());
        assert!(split_date("15-Jan-2024-x").is_err());
    }
}
