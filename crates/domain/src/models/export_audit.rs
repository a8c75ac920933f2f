//! Export audit trail models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded export attempt.
///
/// Append-only; `cleaned_up` is the only field changed after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: i64,
    pub timestamp: DateTime<Utc>,
    pub entries_count: i64,
    pub file_size_bytes: i64,
    pub processing_time_ms: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub email_sent: bool,
    pub cleaned_up: bool,
    pub error_message: Option<String>,
    /// Artifact written by this attempt, if it got that far.
    pub file_name: Option<String>,
}

impl AuditEntry {
    pub fn succeeded(&self) -> bool {
        self.error_message.is_none()
    }
}

/// Audit row to insert at the end of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub user_id: i64,
    pub timestamp: DateTime<Utc>,
    pub entries_count: i64,
    pub file_size_bytes: i64,
    pub processing_time_ms: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub email_sent: bool,
    pub error_message: Option<String>,
    pub file_name: Option<String>,
}

impl NewAuditEntry {
    /// Materializes the row as the store would return it.
    pub fn into_entry(self, id: i64) -> AuditEntry {
        AuditEntry {
            id,
            user_id: self.user_id,
            timestamp: self.timestamp,
            entries_count: self.entries_count,
            file_size_bytes: self.file_size_bytes,
            processing_time_ms: self.processing_time_ms,
            start_date: self.start_date,
            end_date: self.end_date,
            expires_at: self.expires_at,
            email_sent: self.email_sent,
            cleaned_up: false,
            error_message: self.error_message,
            file_name: self.file_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_into_entry_starts_uncleaned() {
        let now = Utc::now();
        let entry = NewAuditEntry {
            user_id: 3,
            timestamp: now,
            entries_count: 10,
            file_size_bytes: 2048,
            processing_time_ms: 15,
            start_date: None,
            end_date: None,
            expires_at: now + Duration::days(7),
            email_sent: true,
            error_message: None,
            file_name: Some("user-3_all-time_1-abcdef.json".to_string()),
        }
        .into_entry(99);

        assert_eq!(entry.id, 99);
        assert!(!entry.cleaned_up);
        assert!(entry.succeeded());
    }

    #[test]
    fn test_serializes_camel_case() {
        let now = Utc::now();
        let entry = NewAuditEntry {
            user_id: 3,
            timestamp: now,
            entries_count: 0,
            file_size_bytes: 0,
            processing_time_ms: 4,
            start_date: None,
            end_date: None,
            expires_at: now,
            email_sent: false,
            error_message: Some("Extraction failed".to_string()),
            file_name: None,
        }
        .into_entry(1);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["entriesCount"], 0);
        assert_eq!(json["emailSent"], false);
        assert_eq!(json["errorMessage"], "Extraction failed");
        assert!(!entry.succeeded());
    }
}
