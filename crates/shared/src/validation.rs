//! Common validation utilities.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use validator::ValidationError;

/// Which side of a date range a caller-supplied bound belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Start,
    End,
}

/// A caller-supplied ISO-8601 value before it is pinned to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IsoValue {
    Instant(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
    Date(NaiveDate),
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

fn parse_iso(value: &str) -> Option<IsoValue> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(IsoValue::Instant(ts));
    }
    // RFC 3339 requires seconds; ISO-8601 allows minute precision.
    if let Ok(ts) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%:z") {
        return Some(IsoValue::Instant(ts));
    }
    if let Some(utc) = value.strip_suffix(&['Z', 'z'][..]) {
        return parse_naive(utc).map(|naive| IsoValue::Instant(naive.and_utc().fixed_offset()));
    }
    if let Some(naive) = parse_naive(value) {
        return Some(IsoValue::Naive(naive));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(IsoValue::Date)
}

/// Parses an ISO-8601 date bound into a UTC timestamp.
///
/// Accepted forms:
/// - RFC 3339 timestamps (`2024-01-31T12:00:00Z`, `2024-01-31T12:00:00+02:00`)
/// - minute-precision timestamps (`2024-01-31T12:00Z`, `2024-01-31T12:00+02:00`)
/// - naive timestamps, read as UTC (`2024-01-31T12:00:00`, `2024-01-31T12:00`)
/// - calendar dates (`2024-01-31`); a start bound maps to the first instant of
///   the day and an end bound to the last, so the whole day is included
pub fn parse_date_bound(value: &str, side: BoundSide) -> Result<DateTime<Utc>, ValidationError> {
    let value = value.trim();

    match parse_iso(value) {
        Some(IsoValue::Instant(ts)) => Ok(ts.with_timezone(&Utc)),
        Some(IsoValue::Naive(naive)) => Ok(naive.and_utc()),
        Some(IsoValue::Date(date)) => {
            let time = match side {
                BoundSide::Start => NaiveTime::MIN,
                BoundSide::End => NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
                    .unwrap_or(NaiveTime::MIN),
            };
            Ok(date.and_time(time).and_utc())
        }
        None => {
            let mut err = ValidationError::new("date_format");
            err.message =
                Some(format!("'{}' is not a valid ISO-8601 date or timestamp", value).into());
            Err(err)
        }
    }
}

/// The calendar date the caller wrote, before conversion to UTC.
///
/// `2024-01-01T00:00:00+05:00` is `2024-01-01` here even though it falls on
/// `2023-12-31` in UTC.
pub fn caller_local_date(value: &str) -> Option<NaiveDate> {
    match parse_iso(value.trim())? {
        IsoValue::Instant(ts) => Some(ts.date_naive()),
        IsoValue::Naive(naive) => Some(naive.date()),
        IsoValue::Date(date) => Some(date),
    }
}

/// Validates that a range is not inverted.
pub fn validate_date_order(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => {
            let mut err = ValidationError::new("date_order");
            err.message = Some("startDate must not be after endDate".into());
            Err(err)
        }
        _ => Ok(()),
    }
}
