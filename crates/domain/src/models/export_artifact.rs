//! Export artifact file contents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::export_job::DateRange;
use super::export_record::ExportRecord;

/// A complete artifact as a download handler reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub user_id: i64,
    pub export_date: DateTime<Utc>,
    pub date_range: DateRange,
    pub entries: Vec<ExportRecord>,
    pub expires_at: DateTime<Utc>,
}

/// Everything in an artifact except its entries.
///
/// Deserializing a full artifact file into this type skips the `entries`
/// array without materializing it, which keeps garbage-collection scans cheap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactHeader {
    pub user_id: i64,
    pub export_date: DateTime<Utc>,
    pub date_range: DateRange,
    pub expires_at: DateTime<Utc>,
}

impl ArtifactHeader {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
