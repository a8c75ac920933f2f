//! Email service for export-ready notifications.
//!
//! Supports multiple email providers:
//! - `console`: Logs emails to console (development)
//! - `resend`: Uses the Resend HTTP API

use chrono::{DateTime, Utc};
use domain::models::DateRange;
use domain::services::{DeliveryError, DeliveryReceipt, ExportMailer, OutgoingEmail};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::EmailConfig;

const RESEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors that can occur during email operations.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email service not configured")]
    NotConfigured,

    #[error("Email service disabled")]
    Disabled,

    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

impl From<EmailError> for DeliveryError {
    fn from(err: EmailError) -> Self {
        match err {
            EmailError::NotConfigured | EmailError::Disabled => DeliveryError::NotConfigured,
            EmailError::SendFailed(msg) => DeliveryError::Transport(msg),
            EmailError::ProviderError(msg) => DeliveryError::Rejected(msg),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: String,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    client: reqwest::Client,
}

impl EmailService {
    /// Creates a new EmailService with the given configuration.
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config: Arc::new(config),
            client: reqwest::Client::new(),
        }
    }

    /// Send an email message.
    pub async fn send(&self, message: OutgoingEmail) -> Result<DeliveryReceipt, EmailError> {
        if !self.config.enabled {
            debug!(
                to = %message.to,
                subject = %message.subject,
                "Email service disabled, refusing send"
            );
            return Err(EmailError::Disabled);
        }

        match self.config.provider.as_str() {
            "console" => self.send_console(message).await,
            "resend" => self.send_resend(message).await,
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(EmailError::NotConfigured)
            }
        }
    }

    /// Console provider - logs email to console (for development).
    async fn send_console(&self, message: OutgoingEmail) -> Result<DeliveryReceipt, EmailError> {
        let id = format!("console-{}", Uuid::new_v4());
        info!(
            id = %id,
            to = %message.to,
            from = %message.from,
            subject = %message.subject,
            "Email (console provider)"
        );
        info!(body_text = %message.body, "Email body (plain text)");

        Ok(DeliveryReceipt { id })
    }

    /// Resend provider - sends via the Resend API.
    async fn send_resend(&self, message: OutgoingEmail) -> Result<DeliveryReceipt, EmailError> {
        if self.config.resend_api_key.is_empty() {
            return Err(EmailError::NotConfigured);
        }

        let body = serde_json::json!({
            "from": message.from,
            "to": [message.to],
            "subject": message.subject,
            "text": message.body,
        });

        let url = format!("{}/emails", self.config.resend_api_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.resend_api_key)
            .timeout(RESEND_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::SendFailed(format!("Resend request failed: {}", e)))?;

        if response.status().is_success() {
            let accepted: ResendResponse = response
                .json()
                .await
                .map_err(|e| EmailError::ProviderError(format!("Malformed Resend response: {}", e)))?;
            info!(
                id = %accepted.id,
                to = %message.to,
                subject = %message.subject,
                "Email sent via Resend"
            );
            Ok(DeliveryReceipt { id: accepted.id })
        } else {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(
                status = %status,
                error = %error_body,
                "Resend API error"
            );
            Err(EmailError::ProviderError(format!(
                "Resend returned {}: {}",
                status, error_body
            )))
        }
    }
}

#[async_trait::async_trait]
impl ExportMailer for EmailService {
    async fn send(&self, email: OutgoingEmail) -> Result<DeliveryReceipt, DeliveryError> {
        EmailService::send(self, email).await.map_err(DeliveryError::from)
    }
}

/// Renders the plain-text notification for a finished export.
pub fn export_ready_email(
    from: &str,
    to: &str,
    download_url: &str,
    total_entries: u64,
    range: &DateRange,
    expires_at: DateTime<Utc>,
) -> OutgoingEmail {
    let day = |d: Option<DateTime<Utc>>, open: &str| {
        d.map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| open.to_string())
    };
    let scope = if range.is_all_time() {
        "all of your tracked activity".to_string()
    } else {
        format!(
            "your activity from {} to {}",
            day(range.start, "the beginning"),
            day(range.end, "today")
        )
    };

    let body = format!(
        r#"Hi,

Your Tempo data export is ready. It contains {count} activity records covering {scope}.

Download it here:

{url}

This link will expire on {expires} UTC.

If you didn't request this export, you can safely ignore this email.

Best regards,
The Tempo Team"#,
        count = total_entries,
        scope = scope,
        url = download_url,
        expires = expires_at.format("%Y-%m-%d %H:%M"),
    );

    OutgoingEmail {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Your Tempo data export is ready".to_string(),
        body,
    }
}
