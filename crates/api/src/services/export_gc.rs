//! Reclamation of expired export artifacts.
//!
//! A sweep has three steps:
//! 1. load audit rows that expired and are not yet cleaned up,
//! 2. delete every artifact on disk whose embedded expiry has passed,
//!    including files with no audit row,
//! 3. flag the audit rows whose artifact is gone.
//!
//! Failures in one step never undo another; whatever is left over is picked
//! up by the next sweep.

use chrono::{DateTime, Utc};
use domain::services::ExportAuditStore;
use metrics::counter;
use serde::Serialize;
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::artifact_writer::{ArtifactError, ArtifactStore};

/// Counters for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GcReport {
    pub files_scanned: u64,
    pub files_deleted: u64,
    pub files_failed: u64,
    pub audit_rows_marked: u64,
}

#[derive(Clone)]
pub struct ExportGarbageCollector {
    audit: Arc<dyn ExportAuditStore>,
    artifacts: ArtifactStore,
}

impl ExportGarbageCollector {
    pub fn new(audit: Arc<dyn ExportAuditStore>, artifacts: ArtifactStore) -> Self {
        Self { audit, artifacts }
    }

    /// Runs one sweep as of `now`. Never fails as a whole.
    pub async fn run(&self, now: DateTime<Utc>) -> GcReport {
        let mut report = GcReport::default();

        let candidates = match self.audit.find_cleanup_candidates(now).await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(error = %e, "Failed to load export cleanup candidates");
                Vec::new()
            }
        };

        self.sweep_files(now, &mut report).await;

        let mut reclaimed = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let Some(file_name) = candidate.file_name.as_deref() else {
                reclaimed.push(candidate.id);
                continue;
            };
            match self.artifacts.exists(file_name).await {
                Ok(false) | Err(ArtifactError::InvalidName(_)) => reclaimed.push(candidate.id),
                Ok(true) => debug!(
                    audit_id = candidate.id,
                    file_name = %file_name,
                    "Artifact still present, retrying next sweep"
                ),
                Err(e) => warn!(
                    audit_id = candidate.id,
                    file_name = %file_name,
                    error = %e,
                    "Could not check artifact, retrying next sweep"
                ),
            }
        }

        match self.audit.mark_cleaned_up(&reclaimed).await {
            Ok(marked) => report.audit_rows_marked = marked,
            Err(e) => error!(
                error = %e,
                rows = reclaimed.len(),
                "Failed to mark export audit rows as cleaned up"
            ),
        }

        counter!("export_gc_runs_total").increment(1);
        counter!("export_gc_files_deleted_total").increment(report.files_deleted);
        counter!("export_gc_files_failed_total").increment(report.files_failed);
        counter!("export_gc_audit_rows_marked_total").increment(report.audit_rows_marked);

        info!(
            files_scanned = report.files_scanned,
            files_deleted = report.files_deleted,
            files_failed = report.files_failed,
            audit_rows_marked = report.audit_rows_marked,
            candidates = candidates.len(),
            "Export cleanup sweep finished"
        );

        report
    }

    async fn sweep_files(&self, now: DateTime<Utc>, report: &mut GcReport) {
        let names = match self.artifacts.list().await {
            Ok(names) => names,
            Err(e) => {
                error!(
                    dir = %self.artifacts.dir().display(),
                    error = %e,
                    "Failed to list export artifacts"
                );
                return;
            }
        };

        for name in names {
            report.files_scanned += 1;

            let header = match self.artifacts.read_header(&name).await {
                Ok(header) => header,
                Err(ArtifactError::Serialization(e)) => {
                    warn!(file_name = %name, error = %e, "Skipping unreadable artifact");
                    continue;
                }
                Err(ArtifactError::InvalidName(_)) => {
                    debug!(file_name = %name, "Skipping foreign file");
                    continue;
                }
                Err(e) => {
                    report.files_failed += 1;
                    warn!(file_name = %name, error = %e, "Failed to read artifact header");
                    continue;
                }
            };

            if !header.is_expired(now) {
                continue;
            }

            match self.artifacts.remove(&name).await {
                Ok(()) => {
                    report.files_deleted += 1;
                    info!(
                        file_name = %name,
                        user_id = header.user_id,
                        expires_at = %header.expires_at,
                        "Deleted expired export artifact"
                    );
                }
                Err(ArtifactError::Io(e)) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    report.files_failed += 1;
                    warn!(file_name = %name, error = %e, "Failed to delete expired artifact");
                }
            }
        }
    }
}
