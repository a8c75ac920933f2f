//! Domain models for the export subsystem.

pub mod export_artifact;
pub mod export_audit;
pub mod export_job;
pub mod export_record;

pub use export_artifact::{ArtifactHeader, ExportArtifact};
pub use export_audit::{AuditEntry, NewAuditEntry};
pub use export_job::{
    retention_window, DateRange, ExportJob, ExportJobStatus, ExportMessage, ExportRequest,
    InvalidTransition, DEFAULT_EXPORT_BATCH_SIZE, EXPORT_RETENTION_DAYS,
};
pub use export_record::{ExportRecord, ExtractionQuery};
