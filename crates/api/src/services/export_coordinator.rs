//! Export job coordination.
//!
//! Each submitted job runs as its own tokio task and walks
//! `Received -> Extracting -> Persisting -> Notifying -> Logging` before
//! ending in `Completed` or `Failed`. A failing step jumps straight to
//! `Logging`, so every job that passes validation leaves one audit row.
//! Progress and the terminal result are reported on a bounded channel.

use chrono::Utc;
use domain::models::{
    ArtifactHeader, DateRange, ExportJob, ExportJobStatus, ExportMessage, ExportRequest,
    ExtractionQuery, NewAuditEntry,
};
use domain::services::{
    ActivityRecordSource, DeliveryError, ExportAuditStore, ExportMailer, StoreError,
};
use metrics::{counter, histogram};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use validator::Validate;

use super::artifact_writer::{artifact_file_name, ArtifactError, ArtifactStore};
use super::email::export_ready_email;
use super::extraction_cursor::ExtractionCursor;
use crate::config::Config;

/// Reasons an export job ends in failure.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Invalid export request: {0}")]
    Validation(String),

    #[error("Failed to extract activity records: {0}")]
    Extraction(#[from] StoreError),

    #[error("Failed to write export artifact: {0}")]
    Persistence(#[from] ArtifactError),

    #[error("Failed to send export notification: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Export timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("Export cancelled by shutdown")]
    Cancelled,
}

impl ExportError {
    /// Short label used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::Validation(_) => "validation",
            ExportError::Extraction(_) => "extraction",
            ExportError::Persistence(_) => "persistence",
            ExportError::Delivery(_) => "delivery",
            ExportError::Timeout(_) => "timeout",
            ExportError::Cancelled => "cancelled",
        }
    }
}

/// Pipeline settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub base_url: String,
    pub batch_size: u32,
    pub job_timeout: Option<Duration>,
    pub channel_capacity: usize,
    /// From header of notification emails.
    pub sender: String,
}

impl ExportSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.export.base_url.clone(),
            batch_size: config.export.batch_size,
            job_timeout: config.export.job_timeout(),
            channel_capacity: config.export.channel_capacity,
            sender: format!("{} <{}>", config.email.sender_name, config.email.sender_email),
        }
    }

    /// `{baseUrl}/exports/download/{fileName}`
    pub fn download_url(&self, file_name: &str) -> String {
        format!(
            "{}/exports/download/{}",
            self.base_url.trim_end_matches('/'),
            file_name
        )
    }
}

/// Result of a completed export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub file_name: String,
    pub total_entries: u64,
    pub size_bytes: u64,
    pub download_url: String,
}

/// Handle to a spawned export job.
///
/// Progress messages are lossy: one is dropped whenever the channel is down to
/// its last free slot, even if the receiver is still reading. The terminal
/// `complete` or `error` message is always delivered while the receiver lives.
/// Dropping the receiver does not stop the job.
pub struct ExportJobHandle {
    pub messages: mpsc::Receiver<ExportMessage>,
    pub join: JoinHandle<Result<ExportSummary, ExportError>>,
}

/// Runs export jobs against injected collaborators.
#[derive(Clone)]
pub struct ExportCoordinator {
    records: Arc<dyn ActivityRecordSource>,
    audit: Arc<dyn ExportAuditStore>,
    mailer: Arc<dyn ExportMailer>,
    artifacts: ArtifactStore,
    settings: Arc<ExportSettings>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl ExportCoordinator {
    pub fn new(
        records: Arc<dyn ActivityRecordSource>,
        audit: Arc<dyn ExportAuditStore>,
        mailer: Arc<dyn ExportMailer>,
        artifacts: ArtifactStore,
        settings: ExportSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            records,
            audit,
            mailer,
            artifacts,
            settings: Arc::new(settings),
            shutdown,
            tracker: TaskTracker::new(),
        }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Spawns a job and returns its message channel.
    pub fn submit(&self, request: ExportRequest) -> ExportJobHandle {
        let (tx, rx) = mpsc::channel(self.settings.channel_capacity.max(1));
        let coordinator = self.clone();
        let join = self
            .tracker
            .spawn(async move { coordinator.run(request, tx).await });
        ExportJobHandle { messages: rx, join }
    }

    /// Stops accepting jobs and waits for running ones to finish.
    ///
    /// Returns `false` if jobs were still running when `timeout` elapsed.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, "Waiting for export jobs to finish");
        }
        tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok()
    }

    /// Runs one job to completion on the current task.
    ///
    /// Exactly one terminal message is sent on `tx`.
    pub async fn run(
        &self,
        request: ExportRequest,
        tx: mpsc::Sender<ExportMessage>,
    ) -> Result<ExportSummary, ExportError> {
        let started = Instant::now();

        let range = match validate_request(&request) {
            Ok(range) => range,
            Err(err) => {
                warn!(user_id = request.user_id, error = %err, "Rejected export request");
                counter!("export_jobs_total", "outcome" => "rejected").increment(1);
                emit(&tx, ExportMessage::Error { error: err.to_string() });
                return Err(err);
            }
        };

        let mut job = ExportJob::new(&request, range, Utc::now());
        info!(
            user_id = job.user_id,
            start = ?job.date_range.start,
            end = ?job.date_range.end,
            expires_at = %job.expires_at,
            "Export job received"
        );

        let mut kept_file = None;
        let result = self
            .guarded(self.execute(&mut job, &mut kept_file, &tx))
            .await;

        transition(&mut job, ExportJobStatus::Logging);
        let elapsed = started.elapsed();
        self.record_audit(&job, &result, kept_file, elapsed).await;
        histogram!("export_job_duration_seconds").record(elapsed.as_secs_f64());

        let message = match &result {
            Ok(summary) => {
                transition(&mut job, ExportJobStatus::Completed);
                counter!("export_jobs_total", "outcome" => "completed").increment(1);
                info!(
                    user_id = job.user_id,
                    file_name = %summary.file_name,
                    total_entries = summary.total_entries,
                    elapsed_ms = elapsed.as_millis(),
                    "Export job completed"
                );
                ExportMessage::Complete {
                    total_entries: summary.total_entries,
                    download_url: summary.download_url.clone(),
                }
            }
            Err(err) => {
                transition(&mut job, ExportJobStatus::Failed);
                counter!("export_jobs_total", "outcome" => "failed").increment(1);
                counter!("export_job_failures_total", "reason" => err.kind()).increment(1);
                error!(
                    user_id = job.user_id,
                    error = %err,
                    elapsed_ms = elapsed.as_millis(),
                    "Export job failed"
                );
                ExportMessage::Error {
                    error: err.to_string(),
                }
            }
        };

        emit(&tx, message);
        result
    }

    /// Extract, persist and notify. `kept_file` is set once the artifact is
    /// in place so a later failure can still reference it.
    async fn execute(
        &self,
        job: &mut ExportJob,
        kept_file: &mut Option<String>,
        tx: &mpsc::Sender<ExportMessage>,
    ) -> Result<ExportSummary, ExportError> {
        transition(job, ExportJobStatus::Extracting);

        let file_name = artifact_file_name(job.user_id, &job.file_label, job.started_at);
        let header = ArtifactHeader {
            user_id: job.user_id,
            export_date: job.started_at,
            date_range: job.date_range,
            expires_at: job.expires_at,
        };
        let mut writer = self.artifacts.begin(&file_name, &header).await?;

        let query = ExtractionQuery {
            user_id: job.user_id,
            range: job.date_range,
        };
        let mut cursor =
            ExtractionCursor::new(self.records.as_ref(), query, self.settings.batch_size);
        while let Some(page) = cursor.next_page().await? {
            writer.append(&page).await?;
            counter!("export_rows_extracted_total").increment(page.len() as u64);
            report_progress(tx, cursor.fetched());
        }
        let total_entries = cursor.fetched();

        transition(job, ExportJobStatus::Persisting);
        let written = writer.finish().await?;
        *kept_file = Some(written.file_name.clone());
        info!(
            user_id = job.user_id,
            file_name = %written.file_name,
            size_bytes = written.size_bytes,
            entries = written.entries,
            "Export artifact written"
        );

        transition(job, ExportJobStatus::Notifying);
        let download_url = self.settings.download_url(&written.file_name);
        let email = export_ready_email(
            &self.settings.sender,
            &job.email,
            &download_url,
            total_entries,
            &job.date_range,
            job.expires_at,
        );
        let receipt = self.mailer.send(email).await?;
        info!(
            user_id = job.user_id,
            receipt_id = %receipt.id,
            "Export notification sent"
        );

        Ok(ExportSummary {
            file_name: written.file_name,
            total_entries,
            size_bytes: written.size_bytes,
            download_url,
        })
    }

    /// Races the work against the job deadline and process shutdown.
    async fn guarded<T>(
        &self,
        work: impl Future<Output = Result<T, ExportError>>,
    ) -> Result<T, ExportError> {
        let deadline = self.settings.job_timeout;
        let expiry = async move {
            match deadline {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = work => result,
            _ = expiry => Err(ExportError::Timeout(deadline.unwrap_or_default())),
            _ = self.shutdown.cancelled() => Err(ExportError::Cancelled),
        }
    }

    /// Appends the job's audit row. A failed write is logged and does not
    /// change the job outcome.
    async fn record_audit(
        &self,
        job: &ExportJob,
        result: &Result<ExportSummary, ExportError>,
        kept_file: Option<String>,
        elapsed: Duration,
    ) {
        let (entries_count, file_size_bytes, email_sent, error_message, file_name) = match result {
            Ok(summary) => (
                saturating_i64(summary.total_entries),
                saturating_i64(summary.size_bytes),
                true,
                None,
                Some(summary.file_name.clone()),
            ),
            Err(err) => (0, 0, false, Some(err.to_string()), kept_file),
        };

        let entry = NewAuditEntry {
            user_id: job.user_id,
            timestamp: Utc::now(),
            entries_count,
            file_size_bytes,
            processing_time_ms: i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX),
            start_date: job.date_range.start,
            end_date: job.date_range.end,
            expires_at: job.expires_at,
            email_sent,
            error_message,
            file_name,
        };

        match self.audit.record(entry).await {
            Ok(id) => debug!(user_id = job.user_id, audit_id = id, "Export audit recorded"),
            Err(e) => error!(
                user_id = job.user_id,
                error = %e,
                "Failed to record export audit"
            ),
        }
    }
}

fn validate_request(request: &ExportRequest) -> Result<DateRange, ExportError> {
    request.validate().map_err(|errors| {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field))
                })
            })
            .collect();
        ExportError::Validation(messages.join("; "))
    })?;

    request.date_range().map_err(|e| {
        ExportError::Validation(
            e.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| e.code.to_string()),
        )
    })
}

fn transition(job: &mut ExportJob, next: ExportJobStatus) {
    match job.advance(next) {
        Ok(()) => debug!(user_id = job.user_id, status = %next, "Export job transitioned"),
        Err(e) => warn!(user_id = job.user_id, error = %e, "Ignoring invalid export job transition"),
    }
}

/// Progress is advisory: it is dropped rather than waited on, and the last
/// free slot is left for the terminal message.
fn report_progress(tx: &mpsc::Sender<ExportMessage>, processed: u64) {
    if tx.capacity() <= 1 {
        debug!(processed, "Export progress channel full, dropping update");
        return;
    }
    if let Err(TrySendError::Full(_)) = tx.try_send(ExportMessage::Progress { processed }) {
        debug!(processed, "Export progress channel full, dropping update");
    }
}

fn emit(tx: &mpsc::Sender<ExportMessage>, message: ExportMessage) {
    match tx.try_send(message) {
        Ok(()) => {}
        Err(TrySendError::Closed(_)) => debug!("Export message receiver dropped"),
        Err(TrySendError::Full(_)) => warn!("Export message channel full, terminal message lost"),
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
