//! SafeSend Relay - webhook receiver for SafeSend Returns events.
//!
//! Accepts event notifications, downloads signed documents from the SAS URLs
//! they reference, and relays an email notification to a fixed recipient list
//! over SMTP or Microsoft Graph.
//!
//! ## Architecture
//!
//! ```text
//! SafeSend → Web Server → auth gate → dispatch → [fetch] → compose
//!          → NotificationSender
//! ```

pub mod compose;
pub mod config;
pub mod event;
pub mod fetch;
pub mod mail;
pub mod relay;
pub mod util;
pub mod web;

// Re-export commonly used types
pub use config::{Config, MailChannelConfig};
pub use event::{EventKind, FileDescriptor, InboundEvent};
pub use mail::{build_sender, DeliveryError, NotificationMessage, NotificationSender};
pub use relay::{DeliveryStatus, Relay, RelayOutcome};
pub use web::{router, AppState};
