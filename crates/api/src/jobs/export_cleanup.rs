//! Expired export cleanup background job.

use chrono::Utc;

use super::scheduler::{Job, JobFrequency};
use crate::services::ExportGarbageCollector;

/// Background job that runs the export garbage collector.
pub struct ExportCleanupJob {
    collector: ExportGarbageCollector,
    interval_minutes: u64,
}

impl ExportCleanupJob {
    /// Create a new cleanup job.
    ///
    /// # Arguments
    /// * `collector` - Garbage collector over the artifact directory and audit log
    /// * `interval_minutes` - Minutes between sweeps
    pub fn new(collector: ExportGarbageCollector, interval_minutes: u64) -> Self {
        Self {
            collector,
            interval_minutes,
        }
    }
}

#[async_trait::async_trait]
impl Job for ExportCleanupJob {
    fn name(&self) -> &'static str {
        "export_cleanup"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(self.interval_minutes)
    }

    async fn execute(&self) -> Result<(), String> {
        let report = self.collector.run(Utc::now()).await;

        if report.files_failed > 0 {
            return Err(format!(
                "{} of {} export artifacts could not be cleaned up",
                report.files_failed, report.files_scanned
            ));
        }

        Ok(())
    }
}
