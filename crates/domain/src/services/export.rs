//! Store contracts used by the export pipeline.

use chrono::{DateTime, Utc};
use shared::pagination::PageKey;
use thiserror::Error;

use crate::models::{AuditEntry, ExportRecord, ExtractionQuery, NewAuditEntry};

/// Failure reported by a backing store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

/// Paginated, range-scoped read over tracked activity.
#[async_trait::async_trait]
pub trait ActivityRecordSource: Send + Sync {
    /// Returns up to `limit` records for the query ordered by
    /// `(start_time, id)` ascending, strictly after `after` when given.
    async fn fetch_page(
        &self,
        query: &ExtractionQuery,
        after: Option<PageKey>,
        limit: u32,
    ) -> Result<Vec<ExportRecord>, StoreError>;
}

/// Append-only record of export attempts.
#[async_trait::async_trait]
pub trait ExportAuditStore: Send + Sync {
    /// Appends one row and returns its store-assigned id.
    async fn record(&self, entry: NewAuditEntry) -> Result<i64, StoreError>;

    /// Rows with `expires_at <= now` that are not yet cleaned up.
    async fn find_cleanup_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<AuditEntry>, StoreError>;

    /// Sets `cleaned_up = true` on the given rows. Returns rows changed.
    async fn mark_cleaned_up(&self, ids: &[i64]) -> Result<u64, StoreError>;

    /// A user's attempts, newest first, strictly before `before` when given.
    async fn list_for_user(
        &self,
        user_id: i64,
        before: Option<PageKey>,
        limit: i64,
    ) -> Result<Vec<AuditEntry>, StoreError>;
}
