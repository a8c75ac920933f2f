//! Delivery channel contract for export notifications.
//!
//! The channel is a third-party collaborator: the pipeline only needs
//! `send(from, to, subject, body) -> {id} | {error}`.

use std::sync::{Arc, Mutex};
use thiserror::Error;

/// A rendered message ready for the delivery channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Provider-assigned identifier of an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub id: String,
}

/// Errors that can occur while handing a message to the channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Delivery channel not configured")]
    NotConfigured,

    #[error("Delivery rejected: {0}")]
    Rejected(String),

    #[error("Delivery transport error: {0}")]
    Transport(String),
}

/// Delivery channel used to tell users their export is ready.
#[async_trait::async_trait]
pub trait ExportMailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Mock mailer for development and testing.
///
/// Records every message it accepts instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct MockExportMailer {
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
}

impl MockExportMailer {
    /// Create a new mock mailer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock mailer that rejects every message.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ExportMailer for MockExportMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<DeliveryReceipt, DeliveryError> {
        if self.simulate_failure {
            tracing::warn!(to = %email.to, "Mock mailer simulating failure");
            return Err(DeliveryError::Rejected("Simulated failure".to_string()));
        }

        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Mock: Would send export notification"
        );

        let mut sent = self
            .sent
            .lock()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        sent.push(email);
        Ok(DeliveryReceipt {
            id: format!("mock-{}", sent.len()),
        })
    }
}
