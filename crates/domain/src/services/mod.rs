//! Domain services for the export subsystem.
//!
//! Collaborator contracts live here so the pipeline can be driven by the
//! Postgres-backed repositories in production and by in-memory fakes in tests.

pub mod export;
pub mod notification;

pub use export::{ActivityRecordSource, ExportAuditStore, StoreError};
pub use notification::{
    DeliveryError, DeliveryReceipt, ExportMailer, MockExportMailer, OutgoingEmail,
};
