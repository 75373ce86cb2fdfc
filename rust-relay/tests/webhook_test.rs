//! End-to-end tests for the webhook router.
//!
//! Document URLs point at a wiremock server and mail goes to a recording
//! sender, so every outbound call is observable.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use reqwest::Client;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use safesend_relay::{
    router, AppState, Config, DeliveryError, NotificationMessage, NotificationSender,
};

const API_KEY: &str = "test-api-key";
const WEBHOOK: &str = "/safesend-webhook";

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<NotificationMessage>>,
}

impl RecordingSender {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn last(&self) -> NotificationMessage {
        self.sent.lock().unwrap().last().cloned().expect("a message was sent")
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    fn channel(&self) -> &'static str {
        "recording"
    }

    async fn send(
        &self,
        message: &NotificationMessage,
        _recipients: &[String],
    ) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

struct UnreachableSender;

#[async_trait]
impl NotificationSender for UnreachableSender {
    fn channel(&self) -> &'static str {
        "unreachable"
    }

    async fn send(&self, _: &NotificationMessage, _: &[String]) -> Result<(), DeliveryError> {
        Err(DeliveryError::Smtp("Connection refused (os error 111)".to_string()))
    }
}

struct TestApp {
    app: Router,
    recorder: Arc<RecordingSender>,
    _storage: tempfile::TempDir,
}

fn base_config(storage: &tempfile::TempDir) -> Config {
    Config {
        api_key: Some(API_KEY.to_string()),
        email_to: vec!["team@yourfirm.com".to_string()],
        storage_dir: storage.path().to_path_buf(),
        request_timeout_ms: 5_000,
        ..Config::default()
    }
}

fn test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let storage = tempfile::tempdir().unwrap();
    let mut config = base_config(&storage);
    configure(&mut config);

    let recorder = Arc::new(RecordingSender::default());
    let sender: Arc<dyn NotificationSender> = recorder.clone();
    let app = router(AppState::new(config, Client::new(), Some(sender)));

    TestApp {
        app,
        recorder,
        _storage: storage,
    }
}

fn test_app() -> TestApp {
    test_app_with(|_| {})
}

fn post(body: impl Into<Body>, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(WEBHOOK)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(body.into()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_missing_or_wrong_key_is_unauthorized_without_side_effects() {
    let docs = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
        .expect(0)
        .mount(&docs)
        .await;

    let t = test_app();
    let body = json!({
        "eventType": 1000,
        "signedEFiles": [{"fileName": "8879.pdf", "fileSAS": format!("{}/8879.pdf", docs.uri())}]
    })
    .to_string();

    for key in [None, Some("wrong-key")] {
        let (status, json) = send(&t.app, post(body.clone(), key)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["status"], "unauthorized");
    }
    assert_eq!(t.recorder.count(), 0);
}

#[tokio::test]
async fn test_unconfigured_key_rejects_everything() {
    let t = test_app_with(|c| c.api_key = None);
    let (status, _) = send(&t.app, post(json!({"eventType": 0}).to_string(), Some(API_KEY))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_test_event_acknowledged_without_fetch_or_mail() {
    let docs = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&docs)
        .await;

    let t = test_app();
    let body = json!({
        "eventType": 0,
        "status": "Completed",
        "signedEFiles": [{"fileName": "8879.pdf", "fileSAS": format!("{}/8879.pdf", docs.uri())}]
    })
    .to_string();

    let (status, json) = send(&t.app, post(body, Some(API_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "success", "message": "Test event received"}));
    assert_eq!(t.recorder.count(), 0);
}

#[tokio::test]
async fn test_documents_ready_attaches_downloaded_file() {
    let docs = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/returns/8879.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 signed".to_vec()))
        .expect(1)
        .mount(&docs)
        .await;

    let t = test_app();
    let body = json!({
        "eventType": 1000,
        "status": "Signed",
        "clientId": "C-17",
        "documentId": 981,
        "signedEFiles": [
            {
                "fileName": "8879.pdf",
                "fileSAS": format!("{}/returns/8879.pdf?sv=2021&sig=abc", docs.uri())
            }
        ]
    })
    .to_string();

    let (status, json) = send(&t.app, post(body, Some(API_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "processed");
    assert_eq!(json["event_type"], 1000);
    assert_eq!(json["attachments"], 1);
    assert_eq!(json["delivery"], "sent");

    let message = t.recorder.last();
    assert_eq!(message.attachments.len(), 1);
    assert_eq!(message.attachments[0].file_name, "8879.pdf");
    assert_eq!(message.attachments[0].content, b"%PDF-1.7 signed");
    assert!(message.body.contains("Client ID: C-17"));
}

#[tokio::test]
async fn test_documents_ready_with_missing_file_still_succeeds() {
    let docs = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("BlobNotFound"))
        .expect(1)
        .mount(&docs)
        .await;

    let t = test_app();
    let body = json!({
        "eventType": 1000,
        "status": "Signed",
        "signedEFiles": [{"fileName": "8879.pdf", "fileSAS": format!("{}/8879.pdf", docs.uri())}]
    })
    .to_string();

    let (status, json) = send(&t.app, post(body, Some(API_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["attachments"], 0);
    assert_eq!(json["delivery"], "sent");

    let message = t.recorder.last();
    assert!(message.attachments.is_empty());
    assert!(message.body.contains("No signed documents were found for this event."));
}

#[tokio::test]
async fn test_status_changed_subject() {
    let t = test_app();
    let body = json!({"eventType": 1001, "status": "Completed", "taxYear": 2024}).to_string();

    let (status, json) = send(&t.app, post(body, Some(API_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["delivery"], "sent");
    assert_eq!(
        t.recorder.last().subject,
        "SafeSend Return Status Changed - Completed"
    );
}

#[tokio::test]
async fn test_empty_recipients_skip_delivery() {
    let t = test_app_with(|c| c.email_to.clear());
    let body = json!({"eventType": 1001, "status": "Completed"}).to_string();

    let (status, json) = send(&t.app, post(body, Some(API_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["delivery"], "skipped");
    assert_eq!(t.recorder.count(), 0);
}

#[tokio::test]
async fn test_delivery_failure_reported_in_body() {
    let storage = tempfile::tempdir().unwrap();
    let sender: Arc<dyn NotificationSender> = Arc::new(UnreachableSender);
    let app = router(AppState::new(base_config(&storage), Client::new(), Some(sender)));

    let body = json!({"eventType": 1001, "status": "Completed"}).to_string();
    let (status, json) = send(&app, post(body, Some(API_KEY))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "processed");
    assert_eq!(json["delivery"], "failed");
    assert_eq!(json["detail"], "SMTP delivery failed");
    assert!(!json.to_string().contains("os error"));
}

#[tokio::test]
async fn test_unknown_event_acknowledged_without_mail() {
    let t = test_app();
    let body = json!({"eventType": 9999, "status": "Completed"}).to_string();

    let (status, json) = send(&t.app, post(body, Some(API_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "processed", "message": "Event acknowledged"}));
    assert_eq!(t.recorder.count(), 0);
}

#[tokio::test]
async fn test_malformed_body_degrades_to_acknowledgement() {
    let t = test_app();

    for body in ["{not json", "", "[1, 2]"] {
        let (status, json) = send(&t.app, post(body, Some(API_KEY))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "processed");
    }
    assert_eq!(t.recorder.count(), 0);
}

#[tokio::test]
async fn test_authorization_header_convention() {
    let t = test_app_with(|c| c.api_key_header = "authorization".to_string());
    let request = Request::builder()
        .method("POST")
        .uri(WEBHOOK)
        .header("Authorization", format!("Bearer {}", API_KEY))
        .body(Body::from(json!({"eventType": 0}).to_string()))
        .unwrap();

    let (status, json) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
}

#[tokio::test]
async fn test_liveness_routes_need_no_key() {
    let t = test_app();

    let root = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, json) = send(&t.app, root).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "running");

    let live = Request::builder().uri(WEBHOOK).body(Body::empty()).unwrap();
    let (status, json) = send(&t.app, live).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "live");
}

#[tokio::test]
async fn test_download_route_serves_saved_documents() {
    let storage = tempfile::tempdir().unwrap();
    let saved = storage.path().join("C-17_981_20250415093005000_1_8879.pdf");
    std::fs::write(saved, b"%PDF").unwrap();

    let mut config = base_config(&storage);
    config.serve_downloads = true;
    let app = router(AppState::new(config, Client::new(), None));

    let found = Request::builder()
        .uri("/download/C-17_981_20250415093005000_1_8879.pdf")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(found).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"%PDF");

    let missing = Request::builder()
        .uri("/download/nope.pdf")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(missing).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_route_rejects_path_traversal() {
    let root = tempfile::tempdir().unwrap();
    let storage = root.path().join("signed_returns");
    std::fs::create_dir_all(&storage).unwrap();
    std::fs::write(root.path().join("secret.txt"), b"outside storage").unwrap();

    let config = Config {
        api_key: Some(API_KEY.to_string()),
        storage_dir: storage,
        serve_downloads: true,
        ..Config::default()
    };
    let app = router(AppState::new(config, Client::new(), None));

    for uri in [
        "/download/..%2fsecret.txt",
        "/download/..%2F..%2Fsecret.txt",
        "/download/../secret.txt",
        "/download/%2e%2e/secret.txt",
    ] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert!(
            response.status().is_client_error(),
            "{uri} returned {}",
            response.status()
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(!bytes.windows(15).any(|w| w == b"outside storage"));
    }
}

#[tokio::test]
async fn test_download_route_disabled_by_default() {
    let t = test_app();
    let request = Request::builder()
        .uri("/download/anything.pdf")
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
