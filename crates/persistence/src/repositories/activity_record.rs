//! Activity record repository: the read side of the analytical store.
//!
//! The `activity_records` table belongs to the ingestion pipeline; this
//! repository only reads it. Columns used: `id`, `user_id`, `entity`,
//! `entity_type`, `category`, `start_time`, `end_time`, `project`, `branch`,
//! `language`, `dependencies` (text[]), `line_count`, `char_count`, `is_write`.

use domain::models::{ExportRecord, ExtractionQuery};
use domain::services::{ActivityRecordSource, StoreError};
use shared::pagination::PageKey;
use sqlx::PgPool;

use crate::entities::ActivityRecordEntity;
use crate::metrics::QueryTimer;

/// Repository for reading activity records in export order.
#[derive(Clone)]
pub struct ActivityRecordRepository {
    pool: PgPool,
}

impl ActivityRecordRepository {
    /// Creates a new ActivityRecordRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch one keyset page ordered by `(start_time, id)`.
    ///
    /// Optional bounds and the resume key are bound as nullable parameters so
    /// the statement text never depends on caller input.
    pub async fn find_page(
        &self,
        query: &ExtractionQuery,
        after: Option<PageKey>,
        limit: i64,
    ) -> Result<Vec<ActivityRecordEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_activity_records_page");
        let result = sqlx::query_as::<_, ActivityRecordEntity>(
            r#"
            SELECT id, entity, entity_type, category, start_time, end_time, project,
                   branch, language, dependencies, line_count, char_count, is_write
            FROM activity_records
            WHERE user_id = $1
              AND ($2::timestamptz IS NULL OR start_time >= $2)
              AND ($3::timestamptz IS NULL OR start_time <= $3)
              AND ($4::timestamptz IS NULL OR (start_time, id) > ($4, $5::bigint))
            ORDER BY start_time ASC, id ASC
            LIMIT $6
            "#,
        )
        .bind(query.user_id)
        .bind(query.range.start)
        .bind(query.range.end)
        .bind(after.map(|k| k.timestamp))
        .bind(after.map(|k| k.id))
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.observe(&result);
        result
    }
}

#[async_trait::async_trait]
impl ActivityRecordSource for ActivityRecordRepository {
    async fn fetch_page(
        &self,
        query: &ExtractionQuery,
        after: Option<PageKey>,
        limit: u32,
    ) -> Result<Vec<ExportRecord>, StoreError> {
        let rows = self
            .find_page(query, after, i64::from(limit))
            .await?;
        Ok(rows.into_iter().map(ExportRecord::from).collect())
    }
}
