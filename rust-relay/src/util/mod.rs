//! Small shared helpers.

pub mod text;

pub use text::{redact_url, sanitize_component, truncate_chars, LOG_BODY_LIMIT};
