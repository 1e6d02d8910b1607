use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use flagsnap_lib::snapshot::{SnapshotEnvelope, SnapshotSource};

use super::auth::{bearer_from_headers, check_refresh_token, refresh_disabled, unauthorized, AuthOutcome};
use super::metrics::{handle_metrics, metrics};
use super::resolver::SnapshotResolver;

/// Shared request context. The durable store behind the resolver is the only
/// cross-request mutable state; everything here is read-only per request.
pub struct AppState {
    pub resolver: SnapshotResolver,
    pub refresh_secret: Option<String>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .route("/v1/features", get(handle_features))
        .route("/v1/refresh", post(handle_refresh))
        .fallback(handle_fallback)
        .with_state(state)
}

fn source_label(source: SnapshotSource) -> &'static str {
    match source {
        SnapshotSource::Origin => "origin",
        SnapshotSource::Cache => "cache",
        SnapshotSource::Fallback => "fallback",
    }
}

/// The HTTP cache is explicitly disabled on every response: the durable
/// cache is internal, and each call must re-run the source state machine.
fn envelope_response(envelope: SnapshotEnvelope) -> Response {
    (
        StatusCode::OK,
        [("cache-control", "no-store")],
        Json(envelope),
    )
        .into_response()
}

// ── GET /health ──────────────────────────────────────────────

pub async fn handle_health(State(state): State<Arc<AppState>>) -> Response {
    let cached = state.resolver.cache_record().await;
    (
        StatusCode::OK,
        [("cache-control", "no-store")],
        Json(serde_json::json!({
            "status": "ok",
            "cached": cached.is_some(),
            "cacheAgeSeconds": cached.map(|r| r.age_seconds()),
        })),
    )
        .into_response()
}

// ── GET /v1/features ─────────────────────────────────────────

pub async fn handle_features(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let start = Instant::now();
    let force = query.get("force").map(|v| v == "true").unwrap_or(false);

    let envelope = state.resolver.load_snapshot(force).await;

    let label = source_label(envelope.source);
    let m = metrics();
    m.serves_total.with_label_values(&[label]).inc();
    m.serve_duration
        .with_label_values(&[label])
        .observe(start.elapsed().as_secs_f64());

    envelope_response(envelope)
}

// ── POST /v1/refresh ─────────────────────────────────────────

pub async fn handle_refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let token = bearer_from_headers(&headers);
    match check_refresh_token(state.refresh_secret.as_deref(), token) {
        AuthOutcome::Disabled => {
            metrics().refresh_total.with_label_values(&["disabled"]).inc();
            refresh_disabled()
        }
        AuthOutcome::Unauthorized => {
            metrics()
                .refresh_total
                .with_label_values(&["unauthorized"])
                .inc();
            unauthorized()
        }
        AuthOutcome::Allowed => {
            let envelope = state.resolver.load_snapshot(true).await;
            let outcome = match envelope.source {
                SnapshotSource::Origin => "ok",
                _ => "degraded",
            };
            metrics().refresh_total.with_label_values(&[outcome]).inc();
            envelope_response(envelope)
        }
    }
}

// ── Anything else ────────────────────────────────────────────

pub async fn handle_fallback() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [("allow", "GET, POST"), ("cache-control", "no-store")],
        Json(serde_json::json!({"error": "method not allowed"})),
    )
        .into_response()
}
