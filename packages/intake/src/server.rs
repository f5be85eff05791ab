//! HTTP server: submit-form endpoint plus health and metrics
//!
//! - `POST /api/submit-form` - validate, enrich and forward a signup
//! - `OPTIONS /api/submit-form` - permissive pre-flight (204)
//! - `GET /api/submit-form` - usage probe
//! - `GET /health` - JSON status
//! - `GET /healthz` - liveness
//! - `GET /metrics` - Prometheus metrics

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use eyre::eyre;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::context::RequestContext;
use crate::error::IntakeError;
use crate::metrics::Metrics;
use crate::store::RecordStore;
use crate::submission::parse_submission;

pub const SUBMIT_PATH: &str = "/api/submit-form";

/// Shared state for the HTTP server
#[derive(Clone)]
pub struct AppState {
    /// `None` when no Notion credential is configured
    pub store: Option<Arc<dyn RecordStore>>,
    pub metrics: Arc<Metrics>,
    pub timezone: Arc<str>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Option<Arc<dyn RecordStore>>, metrics: Arc<Metrics>, timezone: &str) -> Self {
        Self {
            store,
            metrics,
            timezone: Arc::from(timezone),
            started_at: Instant::now(),
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let submit_form = post(submit)
        .options(preflight)
        .get(probe)
        .fallback(method_not_allowed)
        .layer(middleware::map_response(with_cors_headers));

    Router::new()
        .route(SUBMIT_PATH, submit_form)
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// CORS and caching headers attached to every submit-form response
async fn with_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS, GET"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn probe() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "msg": "Use POST to submit form" }))
}

async fn method_not_allowed() -> IntakeError {
    IntakeError::MethodNotAllowed
}

async fn submit(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    match forward_submission(&state, &headers, &body).await {
        Ok(()) => {
            state.metrics.record_outcome("accepted");
            info!("Submission forwarded");
            Json(json!({ "success": true })).into_response()
        }
        Err(err) => {
            state.metrics.record_outcome(err.outcome());
            match &err {
                IntakeError::Internal(cause) => error!(cause = %cause, "Submission failed"),
                IntakeError::MissingToken => error!("Submission refused: Notion token missing"),
                IntakeError::Upstream { status, .. } => {
                    warn!(status = *status, "Record store rejected submission")
                }
                IntakeError::UpstreamTimeout => warn!("Record store timed out"),
                other => debug!(reason = %other, "Submission rejected"),
            }
            err.into_response()
        }
    }
}

/// Validate, enrich and forward one submission. Nothing is sent to the
/// record store unless validation passes.
async fn forward_submission(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), IntakeError> {
    let submission = parse_submission(body)?;
    let store = state.store.as_ref().ok_or(IntakeError::MissingToken)?;
    let context = RequestContext::from_headers(headers, &state.timezone);

    let timer = state.metrics.upstream_latency_seconds.start_timer();
    let result = store.create_record(&submission, &context).await;
    timer.observe_duration();

    result.map_err(IntakeError::from)
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_configured: bool,
    pub uptime_seconds: u64,
    pub accepted: u64,
    pub invalid: u64,
    pub rejected_upstream: u64,
    pub timeouts: u64,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let m = &state.metrics;
    Json(HealthResponse {
        status: if state.store.is_some() {
            "healthy".to_string()
        } else {
            "misconfigured".to_string()
        },
        store_configured: state.store.is_some(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        accepted: m.outcome_count("accepted"),
        invalid: m.outcome_count("invalid"),
        rejected_upstream: m.outcome_count("rejected_upstream"),
        timeouts: m.outcome_count("timeout"),
    })
}

/// Liveness probe (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    match Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

/// Bind and serve until `shutdown` resolves
pub async fn start_server<F>(
    bind_address: &str,
    port: u16,
    state: AppState,
    shutdown: F,
) -> eyre::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;

    let app = router(state);

    info!("Intake server listening on {}", addr);
    info!("  {}  - Whitelist signup intake", SUBMIT_PATH);
    info!("  /health  - Health status (JSON)");
    info!("  /metrics - Prometheus metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
