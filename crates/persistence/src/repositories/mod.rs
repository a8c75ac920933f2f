//! Repository implementations for database operations.

pub mod activity_record;
pub mod export_audit;

pub use activity_record::ActivityRecordRepository;
pub use export_audit::ExportAuditRepository;
