//! Export pipeline services and external integrations.

pub mod artifact_writer;
pub mod email;
pub mod export_coordinator;
pub mod export_gc;
pub mod extraction_cursor;

pub use artifact_writer::{ArtifactError, ArtifactStore, ArtifactWriter, WrittenArtifact};
pub use email::{EmailError, EmailService};
pub use export_coordinator::{
    ExportCoordinator, ExportError, ExportJobHandle, ExportSettings, ExportSummary,
};
pub use export_gc::{ExportGarbageCollector, GcReport};
pub use extraction_cursor::ExtractionCursor;
