//! Keyset pagination over `(timestamp, id)` composite keys.
//!
//! Offset pagination over an append-heavy table skips or repeats rows when
//! writes land between pages. Every paginated read in this service instead
//! resumes strictly after the last `(timestamp, id)` it returned, so ties on
//! the timestamp are broken by the store-assigned id.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Error type for cursor operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("Invalid cursor format")]
    InvalidFormat,
    #[error("Invalid cursor encoding")]
    InvalidEncoding,
    #[error("Invalid timestamp in cursor")]
    InvalidTimestamp,
    #[error("Invalid ID in cursor")]
    InvalidId,
}

/// Position of a row in a `(timestamp, id)` ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub timestamp: DateTime<Utc>,
    pub id: i64,
}

impl PageKey {
    pub fn new(timestamp: DateTime<Utc>, id: i64) -> Self {
        Self { timestamp, id }
    }

    /// Encodes the key as an opaque, URL-safe cursor string.
    ///
    /// Format: base64(RFC3339_micros:id).
    pub fn encode(&self) -> String {
        let raw = format!(
            "{}:{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.id
        );
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    /// Decodes a cursor produced by [`PageKey::encode`].
    pub fn decode(cursor: &str) -> Result<Self, CursorError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|_| CursorError::InvalidEncoding)?;
        let s = String::from_utf8(decoded).map_err(|_| CursorError::InvalidFormat)?;

        // The timestamp itself contains colons; the id follows the last one.
        let (timestamp_str, id_str) = s.rsplit_once(':').ok_or(CursorError::InvalidFormat)?;

        let id: i64 = id_str.parse().map_err(|_| CursorError::InvalidId)?;
        let timestamp = DateTime::parse_from_rfc3339(timestamp_str)
            .map_err(|_| CursorError::InvalidTimestamp)?
            .with_timezone(&Utc);

        Ok(Self { timestamp, id })
    }
}

impl Ord for PageKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for PageKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_cursor_preserves_microseconds() {
        let timestamp = Utc
            .with_ymd_and_hms(2024, 6, 15, 14, 30, 45)
            .unwrap()
            .with_nanosecond(123_456_000)
            .unwrap();
        let key = PageKey::new(timestamp, 999_999);

        let decoded = PageKey::decode(&key.encode()).unwrap();
        assert_eq!(decoded.timestamp.timestamp_micros(), timestamp.timestamp_micros());
        assert_eq!(decoded.id, 999_999);
    }

    #[test]
    fn test_decode_invalid_base64() {
        assert_eq!(
            PageKey::decode("not-valid-base64!!!"),
            Err(CursorError::InvalidEncoding)
        );
    }

    #[test]
    fn test_decode_missing_colon() {
        let invalid = URL_SAFE_NO_PAD.encode(b"no-colon-here");
        assert_eq!(PageKey::decode(&invalid), Err(CursorError::InvalidFormat));
    }

    #[test]
    fn test_decode_invalid_id() {
        let invalid = URL_SAFE_NO_PAD.encode(b"2024-01-15T10:30:00Z:not-a-number");
        assert_eq!(PageKey::decode(&invalid), Err(CursorError::InvalidId));
    }

    #[test]
    fn test_decode_invalid_timestamp() {
        let invalid = URL_SAFE_NO_PAD.encode(b"not-a-timestamp:12345");
        assert_eq!(PageKey::decode(&invalid), Err(CursorError::InvalidTimestamp));
    }

    #[test]
    fn test_cursor_is_url_safe() {
        let key = PageKey::new(Utc::now(), i64::MAX);
        let cursor = key.encode();
        assert!(!cursor.contains('+'));
        assert!(!cursor.contains('/'));
        assert!(!cursor.contains('='));
    }

    #[test]
    fn test_ordering_breaks_timestamp_ties_by_id() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let a = PageKey::new(ts, 1);
        let b = PageKey::new(ts, 2);
        let c = PageKey::new(ts + chrono::Duration::seconds(1), 0);

        assert!(a < b);
        assert!(b < c);
        let mut keys = vec![c, a, b];
        keys.sort();
        assert_eq!(keys, vec![a, b, c]);
    }

    #[test]
    fn test_display() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(PageKey::new(ts, 7).to_string(), "2024-01-15T10:30:00.000Z#7");
    }
}
