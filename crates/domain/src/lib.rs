//! Domain layer for the Tempo export service.
//!
//! This crate contains:
//! - Export models (jobs, records, artifacts, audit entries)
//! - The export job state machine
//! - Collaborator traits for stores and the delivery channel

pub mod models;
pub mod services;
