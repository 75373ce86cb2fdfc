//! Event dispatch and notification relay.
//!
//! ## Flow
//!
//! ```text
//! InboundEvent → dispatch() → [fetch_documents] → compose_notification
//!              → NotificationSender
//! ```
//!
//! Only test, documents-ready and status-changed events do anything.
//! Every other code is acknowledged and dropped.

use std::sync::Arc;

use reqwest::Client;
use tracing::{error, info, warn};

use crate::compose::compose_notification;
use crate::config::Config;
use crate::event::{EventKind, InboundEvent};
use crate::fetch::fetch_documents;
use crate::mail::{NotificationMessage, NotificationSender};

/// What happened to the notification for a relayed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Skipped(String),
    Failed(String),
}

impl DeliveryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Skipped(_) => "skipped",
            DeliveryStatus::Failed(_) => "failed",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            DeliveryStatus::Sent => None,
            DeliveryStatus::Skipped(reason) | DeliveryStatus::Failed(reason) => Some(reason),
        }
    }
}

/// Result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Connectivity test acknowledged
    TestAcknowledged,
    /// Event relayed as a notification
    Relayed {
        event_type: i64,
        attachments: usize,
        delivery: DeliveryStatus,
    },
    /// Unknown or missing event type, accepted as a no-op
    Ignored { event_type: Option<i64> },
}

/// Everything dispatch needs. All of it is immutable and shared.
pub struct Relay<'a> {
    pub config: &'a Config,
    pub client: &'a Client,
    pub sender: Option<&'a Arc<dyn NotificationSender>>,
}

impl Relay<'_> {
    /// Select behaviour by event type.
    pub async fn dispatch(&self, event: &InboundEvent) -> RelayOutcome {
        let kind = event.kind();

        info!(
            event_type = ?event.event_type,
            kind = kind.label(),
            status = %event.status,
            client_id = %event.client_id,
            document_id = %event.document_id,
            file_count = event.files.len(),
            "event_dispatch"
        );

        match kind {
            EventKind::Test => {
                info!("event_test_acknowledged");
                RelayOutcome::TestAcknowledged
            }
            EventKind::DocumentsReady => {
                let documents = fetch_documents(self.client, self.config, event).await;
                let message = compose_notification(event, documents);
                self.relay(event, kind, message).await
            }
            EventKind::StatusChanged => {
                let message = compose_notification(event, Vec::new());
                self.relay(event, kind, message).await
            }
            EventKind::Unrecognized(code) => {
                info!(event_type = ?code, "event_ignored");
                RelayOutcome::Ignored { event_type: code }
            }
        }
    }

    async fn relay(
        &self,
        event: &InboundEvent,
        kind: EventKind,
        message: NotificationMessage,
    ) -> RelayOutcome {
        let attachments = message.attachments.len();
        let delivery = self.deliver(&message).await;

        info!(
            kind = kind.label(),
            attachments = attachments,
            delivery = delivery.label(),
            "event_relay_complete"
        );

        RelayOutcome::Relayed {
            event_type: event.event_type.unwrap_or_default(),
            attachments,
            delivery,
        }
    }

    /// Send the notification. Errors are logged and folded into the status.
    async fn deliver(&self, message: &NotificationMessage) -> DeliveryStatus {
        let recipients = &self.config.email_to;
        if recipients.is_empty() {
            warn!(subject = %message.subject, "delivery_skipped_no_recipients");
            return DeliveryStatus::Skipped("no recipients configured".to_string());
        }

        let Some(sender) = self.sender else {
            warn!(subject = %message.subject, "delivery_skipped_no_channel");
            return DeliveryStatus::Skipped("no mail channel configured".to_string());
        };

        info!(
            channel = sender.channel(),
            recipients = recipients.len(),
            subject = %message.subject,
            attachments = message.attachments.len(),
            "delivery_starting"
        );

        match sender.send(message, recipients).await {
            Ok(()) => {
                info!(channel = sender.channel(), "delivery_sent");
                DeliveryStatus::Sent
            }
            Err(e) => {
                error!(channel = sender.channel(), error = %e, "delivery_failed");
                DeliveryStatus::Failed(e.summary())
            }
        }
    }
}
