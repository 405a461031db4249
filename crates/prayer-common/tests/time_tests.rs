//! Tests for local-time to instant conversion across dates.

use prayer_common::time::{compute_expiry, local_time_of, parse_date, to_absolute_instant};
use prayer_common::PrayerError;

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_round_trip_every_minute_of_a_day() {
    for hour in 0..24 {
        for minute in (0..60).step_by(7) {
            let local = format!("{:02}:{:02}", hour, minute);
            let instant = to_absolute_instant("15-Jan-2024", &local).unwrap();
            assert_eq!(local_time_of(instant).unwrap(), local);
        }
    }
}

#[test]
fn test_round_trip_across_month_ends() {
    for date in ["31-Jan-2024", "29-Feb-2024", "31-Dec-2023", "01-Jan-2024"] {
        let instant = to_absolute_instant(date, "00:15:00").unwrap();
        assert_eq!(local_time_of(instant).unwrap(), "00:15");
    }
}

// ============================================================================
// Fixed offset
// ============================================================================

#[test]
fn test_offset_is_constant_through_the_year() {
    // No daylight saving in the region: local midnight is always 16:00Z the day before
    for date in ["15-Jan-2024", "15-Apr-2024", "15-Jul-2024", "15-Oct-2024"] {
        let midnight_ms = compute_expiry(date).unwrap() * 1000 - 12 * 3600 * 1000;
        let local_midnight = to_absolute_instant(date, "00:00").unwrap();
        assert_eq!(midnight_ms - local_midnight, 8 * 3600 * 1000, "{date}");
    }
}

#[test]
fn test_consecutive_days_are_24h_apart() {
    let a = to_absolute_instant("28-Feb-2024", "13:21:00").unwrap();
    let b = to_absolute_instant("29-Feb-2024", "13:21:00").unwrap();
    let c = to_absolute_instant("01-Mar-2024", "13:21:00").unwrap();
    assert_eq!(b - a, 86_400_000);
    assert_eq!(c - b, 86_400_000);
}

// ============================================================================
// Expiry
// ============================================================================

#[test]
fn test_expiry_values() {
    // 2024-01-01T12:00:00Z
    assert_eq!(compute_expiry("01-Jan-2024").unwrap(), 1_704_110_400);
    // 2024-02-29T12:00:00Z
    assert_eq!(compute_expiry("29-Feb-2024").unwrap(), 1_709_208_000);
}

#[test]
fn test_month_abbreviation_is_case_insensitive() {
    assert_eq!(parse_date("15-jan-2024").unwrap(), parse_date("15-Jan-2024").unwrap());
    assert!(matches!(parse_date("15-Jnu-2024"), Err(PrayerError::InvalidDate(_))));
}
