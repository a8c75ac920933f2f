//! Export audit log repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::{AuditEntry, NewAuditEntry};
use domain::services::{ExportAuditStore, StoreError};
use shared::pagination::PageKey;
use sqlx::PgPool;

use crate::entities::ExportAuditEntity;
use crate::metrics::QueryTimer;

const AUDIT_COLUMNS: &str = "id, user_id, recorded_at, entries_count, file_size_bytes, \
     processing_time_ms, start_date, end_date, expires_at, email_sent, cleaned_up, \
     error_message, file_name";

/// Repository for the append-only export audit trail.
#[derive(Clone)]
pub struct ExportAuditRepository {
    pool: PgPool,
}

impl ExportAuditRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one audit row.
    pub async fn insert(&self, entry: &NewAuditEntry) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("insert_export_audit");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO export_audit_log (
                user_id, recorded_at, entries_count, file_size_bytes, processing_time_ms,
                start_date, end_date, expires_at, email_sent, cleaned_up, error_message,
                file_name
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE, $10, $11)
            RETURNING id
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.timestamp)
        .bind(entry.entries_count)
        .bind(entry.file_size_bytes)
        .bind(entry.processing_time_ms)
        .bind(entry.start_date)
        .bind(entry.end_date)
        .bind(entry.expires_at)
        .bind(entry.email_sent)
        .bind(&entry.error_message)
        .bind(&entry.file_name)
        .fetch_one(&self.pool)
        .await;
        timer.observe(&result);
        result
    }

    /// Expired rows not yet reconciled by the garbage collector.
    pub async fn find_expired_uncleaned(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExportAuditEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_expired_export_audit");
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM export_audit_log \
             WHERE expires_at <= $1 AND cleaned_up = FALSE \
             ORDER BY expires_at ASC, id ASC"
        );
        let result = sqlx::query_as::<_, ExportAuditEntity>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await;
        timer.observe(&result);
        result
    }

    /// Flag rows as cleaned up. Already-flagged rows are left untouched.
    pub async fn set_cleaned_up(&self, ids: &[i64]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let timer = QueryTimer::new("mark_export_audit_cleaned_up");
        let result = sqlx::query(
            r#"
            UPDATE export_audit_log
            SET cleaned_up = TRUE
            WHERE id = ANY($1) AND cleaned_up = FALSE
            "#,
        )
        .bind(ids)
        .execute(&self.pool)
        .await;
        timer.observe(&result);
        Ok(result?.rows_affected())
    }

    /// A user's export history, newest first.
    pub async fn list_by_user(
        &self,
        user_id: i64,
        before: Option<PageKey>,
        limit: i64,
    ) -> Result<Vec<ExportAuditEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_export_audit_for_user");
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM export_audit_log \
             WHERE user_id = $1 \
               AND ($2::timestamptz IS NULL OR (recorded_at, id) < ($2, $3::bigint)) \
             ORDER BY recorded_at DESC, id DESC \
             LIMIT $4"
        );
        let result = sqlx::query_as::<_, ExportAuditEntity>(&sql)
            .bind(user_id)
            .bind(before.map(|k| k.timestamp))
            .bind(before.map(|k| k.id))
            .bind(limit)
            .fetch_all(&self.pool)
            .await;
        timer.observe(&result);
        result
    }
}

#[async_trait::async_trait]
impl ExportAuditStore for ExportAuditRepository {
    async fn record(&self, entry: NewAuditEntry) -> Result<i64, StoreError> {
        Ok(self.insert(&entry).await?)
    }

    async fn find_cleanup_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let rows = self.find_expired_uncleaned(now).await?;
        Ok(rows.into_iter().map(AuditEntry::from).collect())
    }

    async fn mark_cleaned_up(&self, ids: &[i64]) -> Result<u64, StoreError> {
        Ok(self.set_cleaned_up(ids).await?)
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        before: Option<PageKey>,
        limit: i64,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let rows = self.list_by_user(user_id, before, limit).await?;
        Ok(rows.into_iter().map(AuditEntry::from).collect())
    }
}
