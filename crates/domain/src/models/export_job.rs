//! Export job domain models.
//!
//! An export job lives only for the duration of the background task that runs
//! it. Its durable trace is the audit row written when it reaches `Logging`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared::validation::{caller_local_date, parse_date_bound, validate_date_order, BoundSide};
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Days an artifact stays downloadable after its job started.
pub const EXPORT_RETENTION_DAYS: i64 = 7;

/// Rows fetched per extraction page unless configured otherwise.
pub const DEFAULT_EXPORT_BATCH_SIZE: u32 = 1000;

/// The retention window as a duration.
pub fn retention_window() -> Duration {
    Duration::days(EXPORT_RETENTION_DAYS)
}

/// Job descriptor submitted by a caller.
///
/// The user id is trusted as already authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[validate(range(min = 1, message = "userId must be a positive integer"))]
    pub user_id: i64,

    #[validate(email(message = "email must be a valid address"))]
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl ExportRequest {
    /// Parses the optional bounds into a date range.
    pub fn date_range(&self) -> Result<DateRange, ValidationError> {
        let start = self
            .start_date
            .as_deref()
            .map(|s| parse_date_bound(s, BoundSide::Start))
            .transpose()?;
        let end = self
            .end_date
            .as_deref()
            .map(|s| parse_date_bound(s, BoundSide::End))
            .transpose()?;

        validate_date_order(start, end)?;
        Ok(DateRange { start, end })
    }

    /// Range fragment used in artifact file names.
    ///
    /// `_2024-01-01_to_2024-01-31`, `_all-time`, or `open` for a missing side.
    /// Days are the ones the caller wrote, not their UTC equivalents, so
    /// `2024-01-01T00:00:00+05:00` is labelled `2024-01-01`.
    pub fn file_label(&self) -> String {
        if self.start_date.is_none() && self.end_date.is_none() {
            return "_all-time".to_string();
        }
        let day = |value: Option<&str>| {
            value
                .and_then(caller_local_date)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "open".to_string())
        };
        format!(
            "_{}_to_{}",
            day(self.start_date.as_deref()),
            day(self.end_date.as_deref())
        )
    }
}

/// Inclusive time bounds of an export. `None` on a side means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn all_time() -> Self {
        Self::default()
    }

    pub fn is_all_time(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Whether a timestamp falls inside the bounds.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }
}

/// Lifecycle state of an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportJobStatus {
    Received,
    Extracting,
    Persisting,
    Notifying,
    Logging,
    Completed,
    Failed,
}

impl ExportJobStatus {
    fn rank(self) -> u8 {
        match self {
            ExportJobStatus::Received => 0,
            ExportJobStatus::Extracting => 1,
            ExportJobStatus::Persisting => 2,
            ExportJobStatus::Notifying => 3,
            ExportJobStatus::Logging => 4,
            ExportJobStatus::Completed | ExportJobStatus::Failed => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExportJobStatus::Completed | ExportJobStatus::Failed)
    }

    /// Transitions only move forward. Work steps may be skipped on failure,
    /// but the terminal states are reachable only through `Logging`.
    pub fn can_transition_to(self, next: ExportJobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next.is_terminal() {
            return self == ExportJobStatus::Logging;
        }
        next.rank() > self.rank()
    }
}

impl std::fmt::Display for ExportJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportJobStatus::Received => write!(f, "received"),
            ExportJobStatus::Extracting => write!(f, "extracting"),
            ExportJobStatus::Persisting => write!(f, "persisting"),
            ExportJobStatus::Notifying => write!(f, "notifying"),
            ExportJobStatus::Logging => write!(f, "logging"),
            ExportJobStatus::Completed => write!(f, "completed"),
            ExportJobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Rejected state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid export job transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ExportJobStatus,
    pub to: ExportJobStatus,
}

/// A running export job.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub user_id: i64,
    pub email: String,
    pub date_range: DateRange,
    /// File name fragment for the range, see [`ExportRequest::file_label`].
    pub file_label: String,
    pub status: ExportJobStatus,
    pub started_at: DateTime<Utc>,
    /// Fixed once at job start; the artifact and the audit row both carry it.
    pub expires_at: DateTime<Utc>,
}

impl ExportJob {
    /// Builds a job from a validated request.
    pub fn new(request: &ExportRequest, date_range: DateRange, started_at: DateTime<Utc>) -> Self {
        Self {
            user_id: request.user_id,
            email: request.email.clone(),
            date_range,
            file_label: request.file_label(),
            status: ExportJobStatus::Received,
            started_at,
            expires_at: started_at + retention_window(),
        }
    }

    pub fn advance(&mut self, next: ExportJobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// Messages a running job sends back to its submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExportMessage {
    /// Cumulative row count after an extraction page. Advisory only.
    Progress { processed: u64 },
    #[serde(rename_all = "camelCase")]
    Complete {
        total_entries: u64,
        download_url: String,
    },
    Error { error: String },
}

impl ExportMessage {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExportMessage::Progress { .. })
    }
}
