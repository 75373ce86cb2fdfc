//! Webhook endpoint handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::event::InboundEvent;
use crate::mail::NotificationSender;
use crate::relay::{Relay, RelayOutcome};
use crate::web::auth::verify_api_key;
use crate::Config;

/// Shared application state. Immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub client: Client,
    pub sender: Option<Arc<dyn NotificationSender>>,
}

impl AppState {
    pub fn new(
        config: Config,
        client: Client,
        sender: Option<Arc<dyn NotificationSender>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            client,
            sender,
        }
    }
}

// =============================================================================
// Liveness
// =============================================================================

/// Liveness response.
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// `GET /`
pub async fn running() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running",
        message: None,
    })
}

/// `GET` on the webhook path. Unauthenticated.
pub async fn liveness() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "live",
        message: Some("SafeSend webhook relay is live"),
    })
}

// =============================================================================
// SafeSend Webhook
// =============================================================================

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl WebhookResponse {
    fn simple(status: &'static str, message: Option<&'static str>) -> Self {
        WebhookResponse {
            status,
            message,
            event_type: None,
            attachments: None,
            delivery: None,
            detail: None,
        }
    }
}

impl From<RelayOutcome> for WebhookResponse {
    fn from(outcome: RelayOutcome) -> Self {
        match outcome {
            RelayOutcome::TestAcknowledged => {
                WebhookResponse::simple("success", Some("Test event received"))
            }
            RelayOutcome::Ignored { .. } => {
                WebhookResponse::simple("processed", Some("Event acknowledged"))
            }
            RelayOutcome::Relayed {
                event_type,
                attachments,
                delivery,
            } => WebhookResponse {
                status: "processed",
                message: None,
                event_type: Some(event_type),
                attachments: Some(attachments),
                delivery: Some(delivery.label()),
                detail: delivery.detail().map(str::to_string),
            },
        }
    }
}

/// SafeSend webhook endpoint.
///
/// This endpoint:
/// 1. Verifies the shared-secret header
/// 2. Parses the body leniently (bad JSON becomes an empty event)
/// 3. Dispatches on `eventType` and relays the notification
///
/// Only a failed auth check produces a non-200 status.
pub async fn safesend_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let decision = verify_api_key(
        &headers,
        &state.config.api_key_header,
        state.config.api_key.as_deref(),
    );
    if !decision.is_accepted() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(WebhookResponse::simple("unauthorized", None)),
        );
    }

    info!(body_length = body.len(), "webhook_received");

    let event = InboundEvent::from_bytes(&body);
    let relay = Relay {
        config: &state.config,
        client: &state.client,
        sender: state.sender.as_ref(),
    };
    let outcome = relay.dispatch(&event).await;

    (StatusCode::OK, Json(WebhookResponse::from(outcome)))
}
