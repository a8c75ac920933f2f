//! Export audit log entity.

use chrono::{DateTime, Utc};
use domain::models::AuditEntry;
use sqlx::FromRow;

/// Database entity for the `export_audit_log` table.
#[derive(Debug, Clone, FromRow)]
pub struct ExportAuditEntity {
    /// Store-assigned identity.
    pub id: i64,

    pub user_id: i64,

    /// When the attempt finished.
    pub recorded_at: DateTime<Utc>,

    pub entries_count: i64,
    pub file_size_bytes: i64,
    pub processing_time_ms: i64,

    /// Requested bounds, if any.
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,

    /// Same instant as the artifact's embedded expiry.
    pub expires_at: DateTime<Utc>,

    pub email_sent: bool,

    /// Set once by the garbage collector.
    pub cleaned_up: bool,

    pub error_message: Option<String>,
    pub file_name: Option<String>,
}

impl From<ExportAuditEntity> for AuditEntry {
    fn from(entity: ExportAuditEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            timestamp: entity.recorded_at,
            entries_count: entity.entries_count,
            file_size_bytes: entity.file_size_bytes,
            processing_time_ms: entity.processing_time_ms,
            start_date: entity.start_date,
            end_date: entity.end_date,
            expires_at: entity.expires_at,
            email_sent: entity.email_sent,
            cleaned_up: entity.cleaned_up,
            error_message: entity.error_message,
            file_name: entity.file_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_to_domain() {
        let now = Utc::now();
        let entity = ExportAuditEntity {
            id: 12,
            user_id: 42,
            recorded_at: now,
            entries_count: 2500,
            file_size_bytes: 1_048_576,
            processing_time_ms: 830,
            start_date: None,
            end_date: None,
            expires_at: now + chrono::Duration::days(7),
            email_sent: true,
            cleaned_up: false,
            error_message: None,
            file_name: Some("user-42_all-time_1717243200000-0a1b2c.json".to_string()),
        };

        let entry = AuditEntry::from(entity);
        assert_eq!(entry.timestamp, now);
        assert_eq!(entry.entries_count, 2500);
        assert!(entry.succeeded());
    }
}
