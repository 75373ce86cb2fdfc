//! SMTP relay delivery.
//!
//! Wraps `lettre::AsyncSmtpTransport<Tokio1Executor>` configured for
//! STARTTLS with login credentials.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment as MailAttachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use super::{DeliveryError, NotificationMessage, NotificationSender};
use crate::config::SmtpConfig;

/// Delivers notifications through an authenticated SMTP relay.
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpSender {
    /// Build the transport. Nothing connects until the first send.
    pub fn new(
        config: &SmtpConfig,
        from_address: String,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?
            .port(config.port)
            .timeout(Some(timeout));

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from_address,
        })
    }
}

#[async_trait]
impl NotificationSender for SmtpSender {
    fn channel(&self) -> &'static str {
        "smtp"
    }

    async fn send(
        &self,
        message: &NotificationMessage,
        recipients: &[String],
    ) -> Result<(), DeliveryError> {
        let email = build_message(&self.from_address, recipients, message)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?;

        info!(
            recipients = recipients.len(),
            attachments = message.attachments.len(),
            "smtp_message_sent"
        );

        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse().map_err(|e: lettre::address::AddressError| DeliveryError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Build one message addressed to every recipient.
///
/// Plain text without attachments, `multipart/mixed` otherwise.
pub fn build_message(
    from: &str,
    recipients: &[String],
    message: &NotificationMessage,
) -> Result<Message, DeliveryError> {
    let mut builder = Message::builder()
        .from(parse_mailbox(from)?)
        .subject(message.subject.clone());

    for recipient in recipients {
        builder = builder.to(parse_mailbox(recipient)?);
    }

    let email = if message.attachments.is_empty() {
        builder
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
    } else {
        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(message.body.clone()));
        for attachment in &message.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| DeliveryError::Build(e.to_string()))?;
            parts = parts.singlepart(
                MailAttachment::new(attachment.file_name.clone())
                    .body(attachment.content.clone(), content_type),
            );
        }
        builder.multipart(parts)
    };

    email.map_err(|e| DeliveryError::Build(e.to_string()))
}
