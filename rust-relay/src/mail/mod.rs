//! Notification delivery.
//!
//! [`NotificationSender`] is the only thing the relay depends on. Two
//! implementations exist and exactly one is chosen at startup:
//! - [`SmtpSender`]: authenticated STARTTLS relay
//! - [`GraphSender`]: Microsoft Graph `sendMail` behind a client-credentials token

pub mod graph;
pub mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::config::{Config, MailChannelConfig};

pub use graph::GraphSender;
pub use smtp::SmtpSender;

/// A file attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl Attachment {
    /// Build an attachment, guessing the content type from the extension.
    pub fn new(file_name: impl Into<String>, content: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        Self {
            file_name,
            content_type,
            content,
        }
    }
}

/// A composed notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// Delivery failures. Always caught by the relay and reported, never
/// propagated as an HTTP error.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("token request rejected with HTTP {status}: {body}")]
    Token { status: u16, body: String },

    #[error("mail API rejected message with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl DeliveryError {
    /// Short category safe to return to the webhook caller. Upstream
    /// response bodies and transport details stay in the logs.
    pub fn summary(&self) -> String {
        match self {
            DeliveryError::InvalidAddress { .. } => "invalid mail address".to_string(),
            DeliveryError::Build(_) => "message build failed".to_string(),
            DeliveryError::Token { status, .. } => format!("token rejected ({})", status),
            DeliveryError::Rejected { status, .. } => format!("mail API rejected ({})", status),
            DeliveryError::Smtp(_) => "SMTP delivery failed".to_string(),
            DeliveryError::Http(e) if e.is_timeout() => "mail API timed out".to_string(),
            DeliveryError::Http(_) => "mail API request failed".to_string(),
        }
    }
}

/// Mail delivery capability.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Channel name used in logs.
    fn channel(&self) -> &'static str;

    /// Deliver one message to every recipient in a single send.
    async fn send(
        &self,
        message: &NotificationMessage,
        recipients: &[String],
    ) -> Result<(), DeliveryError>;
}

/// Construct the sender for the configured channel, if any.
pub fn build_sender(
    config: &Config,
    client: Client,
) -> Result<Option<Arc<dyn NotificationSender>>, DeliveryError> {
    let sender: Option<Arc<dyn NotificationSender>> = match &config.mail {
        MailChannelConfig::Disabled => None,
        MailChannelConfig::Smtp(smtp) => Some(Arc::new(SmtpSender::new(
            smtp,
            config.email_from.clone(),
            config.request_timeout(),
        )?)),
        MailChannelConfig::Graph(graph) => Some(Arc::new(GraphSender::new(
            client,
            graph.clone(),
            config.email_from.clone(),
            config.request_timeout(),
        ))),
    };

    Ok(sender)
}

/// Content type for an attachment file name.
pub fn content_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}
