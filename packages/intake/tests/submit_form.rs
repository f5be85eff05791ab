//! Endpoint tests for the submit-form route
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot` and a
//! recording record store, so no network access is needed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use intake::{
    context::RequestContext, metrics::Metrics, router, AppState, RecordStore, SignupSubmission,
    StoreError,
};
use serde_json::{json, Value};
use tower::ServiceExt;

/// What the fake store answers
#[derive(Clone)]
enum Behavior {
    Accept,
    Reject(u16, &'static str),
    Timeout,
    Transport,
}

struct RecordingStore {
    behavior: Behavior,
    calls: Mutex<Vec<(SignupSubmission, RequestContext)>>,
}

impl RecordingStore {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn last_call(&self) -> (SignupSubmission, RequestContext) {
        self.calls.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl RecordStore for RecordingStore {
    async fn create_record(
        &self,
        submission: &SignupSubmission,
        context: &RequestContext,
    ) -> Result<(), StoreError> {
        self.calls
            .lock()
            .unwrap()
            .push((submission.clone(), context.clone()));
        match &self.behavior {
            Behavior::Accept => Ok(()),
            Behavior::Reject(status, details) => Err(StoreError::Rejected {
                status: *status,
                details: details.to_string(),
            }),
            Behavior::Timeout => Err(StoreError::Timeout {
                after: Duration::from_millis(12_000),
            }),
            Behavior::Transport => Err(StoreError::Transport(
                "connection refused at 10.0.0.1".to_string(),
            )),
        }
    }
}

fn app_with(store: Option<Arc<RecordingStore>>) -> (Router, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let store = store.map(|s| s as Arc<dyn RecordStore>);
    let state = AppState::new(store, metrics.clone(), "UTC");
    (router(state), metrics)
}

fn post_json(body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/submit-form")
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_minimal_submission_is_forwarded() {
    let store = RecordingStore::new(Behavior::Accept);
    let (app, metrics) = app_with(Some(store.clone()));

    let (status, _, body) = send(
        app,
        post_json(json!({ "email": "a@b.com", "checkbox": true }).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
    assert_eq!(store.call_count(), 1);

    let (submission, _) = store.last_call();
    assert_eq!(submission.email, "a@b.com");
    assert!(submission.privacy_agreed);
    assert_eq!(submission.organisation, "");
    assert_eq!(submission.handle, "");
    assert_eq!(submission.comment, "");
    assert_eq!(metrics.outcome_count("accepted"), 1);
}

#[tokio::test]
async fn test_missing_email_never_reaches_store() {
    let store = RecordingStore::new(Behavior::Accept);
    let (app, metrics) = app_with(Some(store.clone()));

    let (status, _, body) = send(app, post_json(json!({ "checkbox": true }).to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Email is required" }));
    assert_eq!(store.call_count(), 0);
    assert_eq!(metrics.outcome_count("invalid"), 1);
}

#[tokio::test]
async fn test_long_comment_never_reaches_store() {
    let store = RecordingStore::new(Behavior::Accept);
    let (app, _) = app_with(Some(store.clone()));

    let (status, _, body) = send(
        app,
        post_json(json!({ "email": "a@b.com", "comment": "c".repeat(200) }).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "error": "Comment too long (max 150 characters)" })
    );
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_invalid_json_body() {
    let store = RecordingStore::new(Behavior::Accept);
    let (app, _) = app_with(Some(store.clone()));

    let (status, _, body) = send(app, post_json("{\"email\": ")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid JSON body" }));
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_legacy_field_names_are_accepted() {
    let store = RecordingStore::new(Behavior::Accept);
    let (app, _) = app_with(Some(store.clone()));

    let (status, _, _) = send(
        app,
        post_json(
            json!({
                "email": "a@b.com",
                "privacyAgreed": true,
                "betaAgreed": true,
                "organization": "Legacy DAO",
                "isTreasurer": true,
                "assets": "$1M-$10M",
                "handle": "@legacy",
            })
            .to_string(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let (submission, _) = store.last_call();
    assert!(submission.privacy_agreed);
    assert!(submission.beta_agreed);
    assert_eq!(submission.organisation, "Legacy DAO");
    assert!(submission.manages_treasury);
    assert_eq!(submission.handle, "@legacy");
    assert_eq!(submission.comment, "Treasurer: Yes, Assets: $1M-$10M");
}

// ============================================================================
// Request metadata
// ============================================================================

#[tokio::test]
async fn test_request_metadata_is_attached() {
    let store = RecordingStore::new(Behavior::Accept);
    let (app, _) = app_with(Some(store.clone()));

    let request = Request::builder()
        .method("POST")
        .uri("/api/submit-form")
        .header("content-type", "application/json")
        .header("cf-connecting-ip", "203.0.113.7")
        .header("cf-ipcountry", "PT")
        .header("user-agent", "Mozilla/5.0")
        .header("accept-language", "pt-PT")
        .body(Body::from(json!({ "email": "a@b.com" }).to_string()))
        .unwrap();

    let (status, _, _) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);

    let (_, context) = store.last_call();
    assert_eq!(context.ip, "203.0.113.7");
    assert_eq!(context.country, "PT");
    assert_eq!(context.user_agent, "Mozilla/5.0");
    assert_eq!(context.language, "pt-PT");
    assert_eq!(context.referer, "Direct");
    assert_eq!(context.timezone, "UTC");
    assert!(context.timestamp.ends_with('Z'));
}

// ============================================================================
// Upstream outcomes
// ============================================================================

#[tokio::test]
async fn test_upstream_rejection_is_relayed() {
    let store = RecordingStore::new(Behavior::Reject(400, "{\"code\":\"validation_error\"}"));
    let (app, metrics) = app_with(Some(store.clone()));

    let (status, _, body) = send(app, post_json(json!({ "email": "a@b.com" }).to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Failed to save to Notion database");
    assert_eq!(body["status"], 400);
    assert_eq!(body["details"], "{\"code\":\"validation_error\"}");
    assert!(body.get("success").is_none());
    assert_eq!(metrics.outcome_count("rejected_upstream"), 1);
}

#[tokio::test]
async fn test_upstream_server_error_status_is_relayed() {
    let store = RecordingStore::new(Behavior::Reject(503, "unavailable"));
    let (app, _) = app_with(Some(store));

    let (status, _, body) = send(app, post_json(json!({ "email": "a@b.com" }).to_string())).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], 503);
    assert_eq!(body["details"], "unavailable");
}

#[tokio::test]
async fn test_upstream_timeout_is_504() {
    let store = RecordingStore::new(Behavior::Timeout);
    let (app, metrics) = app_with(Some(store));

    let (status, _, body) = send(app, post_json(json!({ "email": "a@b.com" }).to_string())).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body, json!({ "error": "Upstream timeout" }));
    assert_eq!(metrics.outcome_count("timeout"), 1);
}

#[tokio::test]
async fn test_transport_failure_does_not_leak() {
    let store = RecordingStore::new(Behavior::Transport);
    let (app, _) = app_with(Some(store));

    let (status, _, body) = send(app, post_json(json!({ "email": "a@b.com" }).to_string())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Server error" }));
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn test_missing_token_is_server_error() {
    let (app, metrics) = app_with(None);

    let (status, _, body) = send(app, post_json(json!({ "email": "a@b.com" }).to_string())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "error": "Notion token is not configured (set NOTION_API)" })
    );
    assert_eq!(metrics.outcome_count("misconfigured"), 1);
}

#[tokio::test]
async fn test_validation_runs_before_configuration_check() {
    let (app, _) = app_with(None);

    let (status, _, body) = send(app, post_json(json!({}).to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Email is required" }));
}

// ============================================================================
// Methods and CORS
// ============================================================================

fn assert_cors(headers: &axum::http::HeaderMap) {
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "POST, OPTIONS, GET");
    assert_eq!(headers["access-control-allow-headers"], "Content-Type");
    assert_eq!(headers["cache-control"], "no-store");
}

#[tokio::test]
async fn test_preflight() {
    let (app, _) = app_with(None);
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/submit-form")
        .header("origin", "https://aii.example")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();

    let (status, headers, body) = send(app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
    assert_cors(&headers);
}

#[tokio::test]
async fn test_get_probe() {
    let (app, _) = app_with(None);
    let request = Request::builder()
        .method("GET")
        .uri("/api/submit-form")
        .body(Body::empty())
        .unwrap();

    let (status, headers, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "msg": "Use POST to submit form" }));
    assert_cors(&headers);
}

#[tokio::test]
async fn test_other_methods_are_rejected() {
    for method in ["PUT", "DELETE", "PATCH"] {
        let store = RecordingStore::new(Behavior::Accept);
        let (app, _) = app_with(Some(store.clone()));
        let request = Request::builder()
            .method(method)
            .uri("/api/submit-form")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "email": "a@b.com" }).to_string()))
            .unwrap();

        let (status, headers, body) = send(app, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "method {}", method);
        assert_eq!(body, json!({ "error": "Method not allowed" }));
        assert_cors(&headers);
        assert_eq!(store.call_count(), 0);
    }
}

#[tokio::test]
async fn test_error_responses_carry_cors_headers() {
    let (app, _) = app_with(None);
    let (status, headers, _) = send(app, post_json("nope")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_cors(&headers);
}

// ============================================================================
// Health and metrics
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let store = RecordingStore::new(Behavior::Accept);
    let (app, _) = app_with(Some(store));

    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, _, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store_configured"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_reports_outcomes() {
    let store = RecordingStore::new(Behavior::Accept);
    let (app, _) = app_with(Some(store));

    let (status, _, _) = send(
        app.clone(),
        post_json(json!({ "email": "a@b.com" }).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("intake_submissions_total{outcome=\"accepted\"} 1"));
    assert!(text.contains("intake_upstream_latency_seconds"));
}
