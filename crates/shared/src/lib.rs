//! Shared utilities and common types for the Tempo export service.
//!
//! This crate provides common functionality used across all other crates:
//! - Keyset pagination keys and their opaque cursor encoding
//! - Validation of caller-supplied date bounds

pub mod pagination;
pub mod validation;
