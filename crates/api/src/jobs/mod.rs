//! Background job scheduler and job implementations.

mod export_cleanup;
mod scheduler;

pub use export_cleanup::ExportCleanupJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
