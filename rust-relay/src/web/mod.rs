//! Web server module for the SafeSend webhook.
//!
//! Routes:
//! - `GET /`: process is running
//! - `GET {webhook_path}`: unauthenticated liveness check
//! - `POST {webhook_path}`: authenticated event relay
//! - `GET /download/{filename}`: saved documents, only when enabled

pub mod auth;
pub mod handlers;

use axum::{routing::get, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub use auth::{verify_api_key, AuthDecision};
pub use handlers::{
    liveness, running, safesend_webhook, AppState, StatusResponse, WebhookResponse,
};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    let mut app = Router::new().route("/", get(running)).route(
        &config.webhook_path,
        get(liveness).post(safesend_webhook),
    );

    if config.serve_downloads {
        app = app.nest_service("/download", ServeDir::new(&config.storage_dir));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
