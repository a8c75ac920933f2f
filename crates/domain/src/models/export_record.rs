//! Activity records as they appear in an export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::pagination::PageKey;

use super::export_job::DateRange;

/// Read-only snapshot of one tracked activity row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    /// Store-assigned row id; breaks ties between equal start times.
    pub id: i64,
    pub entity: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub category: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub project: Option<String>,
    pub branch: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub line_count: Option<i64>,
    pub char_count: Option<i64>,
    pub is_write: bool,
}

impl ExportRecord {
    /// Position of this record in extraction order.
    pub fn page_key(&self) -> PageKey {
        PageKey::new(self.start_time, self.id)
    }
}

/// Scope of one extraction: a user and optional time bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionQuery {
    pub user_id: i64,
    pub range: DateRange,
}
