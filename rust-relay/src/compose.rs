//! Notification composition.
//!
//! Turns an event plus whatever documents were fetched into the subject,
//! body and attachments of the outgoing email. Pure and deterministic.

use crate::event::InboundEvent;
use crate::fetch::FetchedDocument;
use crate::mail::{Attachment, NotificationMessage};

/// Subject line for every SafeSend notification.
pub fn compose_subject(event: &InboundEvent) -> String {
    format!("SafeSend Return Status Changed - {}", event.status)
}

/// Plain-text body listing the event fields and downloaded documents.
pub fn compose_body(event: &InboundEvent, documents: &[FetchedDocument]) -> String {
    let event_type = event
        .event_type
        .map(|code| code.to_string())
        .unwrap_or_default();

    let fields = [
        ("Event Type", event_type.as_str()),
        ("Status", event.status.as_str()),
        ("Form Type", event.form_type.as_str()),
        ("Tax Year", event.tax_year.as_str()),
        ("Client ID", event.client_id.as_str()),
        ("Document ID", event.document_id.as_str()),
        ("Document GUID", event.document_guid.as_str()),
    ];

    let mut body = String::from("A SafeSend Returns event was received.\n\n");
    for (label, value) in fields {
        if !value.is_empty() {
            body.push_str(&format!("{}: {}\n", label, value));
        }
    }
    body.push('\n');

    if documents.is_empty() {
        body.push_str("No signed documents were found for this event.\n");
    } else {
        body.push_str("Downloaded documents:\n");
        for doc in documents {
            match &doc.saved_path {
                Some(path) => {
                    body.push_str(&format!("- {} (saved to {})\n", doc.file_name, path.display()))
                }
                None => body.push_str(&format!("- {}\n", doc.file_name)),
            }
        }
    }

    body
}

/// Compose the full notification. Each document becomes one attachment.
pub fn compose_notification(
    event: &InboundEvent,
    documents: Vec<FetchedDocument>,
) -> NotificationMessage {
    let subject = compose_subject(event);
    let body = compose_body(event, &documents);
    let attachments = documents
        .into_iter()
        .map(|doc| Attachment::new(doc.file_name, doc.content))
        .collect();

    NotificationMessage {
        subject,
        body,
        attachments,
    }
}
