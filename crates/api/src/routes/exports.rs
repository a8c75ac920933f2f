//! Export routes.
//!
//! Submission is fire-and-forget: the job runs in the background and the user
//! is notified by email when the artifact is ready.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use domain::models::{AuditEntry, ExportMessage, ExportRequest};
use serde::{Deserialize, Serialize};
use shared::pagination::PageKey;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::artifact_writer::validate_file_name;
use crate::services::ExportJobHandle;

const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 100;

/// Response for an accepted export request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportAcceptedResponse {
    pub status: String,
    pub user_id: i64,
}

/// Query parameters for export history.
#[derive(Debug, Default, Deserialize)]
pub struct ListExportsQuery {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// A page of export history, newest first.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExportsResponse {
    pub data: Vec<AuditEntry>,
    pub next_cursor: Option<String>,
}

/// Request an export.
///
/// Input is validated up front so malformed requests get a 400 instead of a
/// background failure. The job itself runs detached.
pub async fn create_export(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    request.date_range()?;

    let user_id = request.user_id;
    let handle = state.exports.submit(request);
    tokio::spawn(drain_job(user_id, handle));

    info!(user_id = user_id, "Export job accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(ExportAcceptedResponse {
            status: "accepted".to_string(),
            user_id,
        }),
    ))
}

/// Consumes a detached job's messages so its channel never fills up.
async fn drain_job(user_id: i64, mut handle: ExportJobHandle) {
    while let Some(message) = handle.messages.recv().await {
        match message {
            ExportMessage::Progress { processed } => {
                debug!(user_id = user_id, processed = processed, "Export progress")
            }
            ExportMessage::Complete { total_entries, .. } => {
                debug!(user_id = user_id, total_entries = total_entries, "Export finished")
            }
            ExportMessage::Error { error } => {
                debug!(user_id = user_id, error = %error, "Export ended with error")
            }
        }
    }

    if let Err(e) = handle.join.await {
        warn!(user_id = user_id, error = %e, "Export task panicked");
    }
}

/// List a user's export history.
pub async fn list_user_exports(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<ListExportsQuery>,
) -> Result<Json<ListExportsResponse>, ApiError> {
    let before = query
        .cursor
        .as_deref()
        .map(PageKey::decode)
        .transpose()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let mut data = state.audit.list_for_user(user_id, before, limit + 1).await?;

    let next_cursor = if data.len() as i64 > limit {
        data.truncate(limit as usize);
        data.last()
            .map(|last| PageKey::new(last.timestamp, last.id).encode())
    } else {
        None
    };

    Ok(Json(ListExportsResponse { data, next_cursor }))
}

/// Download a finished artifact.
///
/// Expired artifacts are reported as missing even if the garbage collector
/// has not removed them yet.
pub async fn download_export(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Response, ApiError> {
    validate_file_name(&file_name)?;

    let header = state.artifacts.read_header(&file_name).await?;
    if header.is_expired(Utc::now()) {
        return Err(ApiError::NotFound("Export has expired".to_string()));
    }

    let (file, len) = state.artifacts.open(&file_name).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        )
        .header(header::CONTENT_LENGTH, len)
        .body(body)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            ApiError::Internal("Failed to build response".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_response_is_camel_case() {
        let json = serde_json::to_value(ExportAcceptedResponse {
            status: "accepted".to_string(),
            user_id: 42,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"status": "accepted", "userId": 42}));
    }

    #[test]
    fn test_list_query_defaults() {
        let query = ListExportsQuery::default();
        assert!(query.cursor.is_none());
        assert_eq!(
            query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT),
            20
        );
    }
}
