//! UTC helpers. Every timestamp in the system is stored and compared in UTC;
//! naive values coming back from the database are assumed to already be UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Current time, timezone-aware UTC.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Re-attach UTC to a naive timestamp read from storage.
pub fn ensure_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(naive, Utc)
}

/// Whole minutes between two instants (`end - start`).
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_minutes()
}

/// Fractional minutes between two instants, for time-compactness scoring.
pub fn minutes_between_f64(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ensure_utc_attaches_offset() {
        let naive = NaiveDateTime::parse_from_str("2024-03-01 12:30:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let aware = ensure_utc(naive);
        assert_eq!(aware, Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn minutes_between_spans() {
        let a = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 3, 1, 12, 9, 30).unwrap();
        assert_eq!(minutes_between(a, b), 9);
        assert!((minutes_between_f64(a, b) - 9.5).abs() < 1e-9);
    }
}
