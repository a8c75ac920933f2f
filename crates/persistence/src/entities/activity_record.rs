//! Activity record entity.

use chrono::{DateTime, Utc};
use domain::models::ExportRecord;
use sqlx::FromRow;

/// Database row of the `activity_records` table, as projected for export.
#[derive(Debug, Clone, FromRow)]
pub struct ActivityRecordEntity {
    pub id: i64,
    pub entity: String,
    pub entity_type: String,
    pub category: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub project: Option<String>,
    pub branch: Option<String>,
    pub language: Option<String>,
    pub dependencies: Option<Vec<String>>,
    pub line_count: Option<i64>,
    pub char_count: Option<i64>,
    pub is_write: Option<bool>,
}

impl From<ActivityRecordEntity> for ExportRecord {
    fn from(entity: ActivityRecordEntity) -> Self {
        Self {
            id: entity.id,
            entity: entity.entity,
            entity_type: entity.entity_type,
            category: entity.category,
            start_time: entity.start_time,
            end_time: entity.end_time,
            project: entity.project,
            branch: entity.branch,
            language: entity.language,
            dependencies: entity.dependencies.unwrap_or_default(),
            line_count: entity.line_count,
            char_count: entity.char_count,
            is_write: entity.is_write.unwrap_or(false),
        }
    }
}
