//! Inbound SafeSend event types.
//!
//! The sender does not publish a strict schema, so the body is read as a loose
//! JSON map and the fields we recognise are lifted into [`InboundEvent`].
//! Anything unparsable degrades to an empty event instead of an error.

use serde_json::{Map, Value};
use tracing::warn;

/// Connectivity test sent from the SafeSend developer console.
pub const EVENT_TEST: i64 = 0;

/// Signed documents are ready for download.
pub const EVENT_DOCUMENTS_READY: i64 = 1000;

/// The return's status changed.
pub const EVENT_STATUS_CHANGED: i64 = 1001;

/// Classification of an inbound event by its `eventType` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Test,
    DocumentsReady,
    StatusChanged,
    /// Unknown or missing code. Accepted as a no-op.
    Unrecognized(Option<i64>),
}

impl EventKind {
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(EVENT_TEST) => EventKind::Test,
            Some(EVENT_DOCUMENTS_READY) => EventKind::DocumentsReady,
            Some(EVENT_STATUS_CHANGED) => EventKind::StatusChanged,
            other => EventKind::Unrecognized(other),
        }
    }

    /// Short label used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Test => "test",
            EventKind::DocumentsReady => "documents_ready",
            EventKind::StatusChanged => "status_changed",
            EventKind::Unrecognized(_) => "unrecognized",
        }
    }
}

/// A downloadable file referenced by an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Display name (`fileName`)
    pub file_name: String,
    /// Time-limited download URL (`fileSAS`)
    pub sas_url: String,
}

/// Typed view of a SafeSend webhook payload.
///
/// Every string field defaults to `""` when absent. Numeric values are kept
/// as their JSON text so identifiers like `clientId: 42` survive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundEvent {
    pub event_type: Option<i64>,
    pub status: String,
    pub form_type: String,
    pub tax_year: String,
    pub client_id: String,
    pub document_id: String,
    pub document_guid: String,
    /// `signedEFiles` followed by `additionalESignedFiles`
    pub files: Vec<FileDescriptor>,
}

impl InboundEvent {
    /// Parse a raw request body. Never fails.
    pub fn from_bytes(body: &[u8]) -> Self {
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return InboundEvent::default();
        }

        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => Self::from_map(&map),
            Ok(other) => {
                warn!(json_type = json_type(&other), "webhook_body_not_object");
                InboundEvent::default()
            }
            Err(e) => {
                warn!(error = %e, body_length = body.len(), "webhook_body_invalid_json");
                InboundEvent::default()
            }
        }
    }

    /// Lift recognised fields out of a JSON object.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut files = Vec::new();
        for key in ["signedEFiles", "additionalESignedFiles"] {
            if let Some(Value::Array(entries)) = map.get(key) {
                for entry in entries {
                    if let Some(descriptor) = parse_descriptor(entry, files.len() + 1) {
                        files.push(descriptor);
                    }
                }
            }
        }

        InboundEvent {
            event_type: map.get("eventType").and_then(parse_code),
            status: field_str(map, "status"),
            form_type: field_str(map, "formType"),
            tax_year: field_str(map, "taxYear"),
            client_id: field_str(map, "clientId"),
            document_id: field_str(map, "documentId"),
            document_guid: field_str(map, "documentGuid"),
            files,
        }
    }

    pub fn kind(&self) -> EventKind {
        EventKind::from_code(self.event_type)
    }
}

/// Accept an integer code or a numeric string such as `"1000"`.
fn parse_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Render a scalar field as a string; absent, null and compound values are "".
fn field_str(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn parse_descriptor(entry: &Value, position: usize) -> Option<FileDescriptor> {
    let obj = entry.as_object()?;

    let sas_url = obj
        .get("fileSAS")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?;

    let file_name = obj
        .get("fileName")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("document-{}.pdf", position));

    Some(FileDescriptor {
        file_name,
        sas_url: sas_url.to_string(),
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
