//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod activity_record;
pub mod export_audit;

pub use activity_record::ActivityRecordEntity;
pub use export_audit::ExportAuditEntity;
