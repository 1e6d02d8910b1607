use std::sync::OnceLock;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Global metrics registry
static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// All application metrics
pub struct Metrics {
    /// Envelopes served by the read endpoint, labelled by provenance.
    pub serves_total: IntCounterVec,
    pub serve_duration: HistogramVec,

    /// Admin refreshes, labelled by outcome (ok / unauthorized / error).
    pub refresh_total: IntCounterVec,

    /// Upstream fetch failures, labelled by kind.
    pub upstream_errors: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

impl Metrics {
    fn new(registry: &Registry) -> Self {
        let serves_total = IntCounterVec::new(
            Opts::new("fsnap_serves_total", "Snapshot envelopes served by source"),
            &["source"],
        )
        .expect("failed to create serves_total metric");

        let serve_duration = HistogramVec::new(
            HistogramOpts::new("fsnap_serve_duration_seconds", "Read endpoint latency"),
            &["source"],
        )
        .expect("failed to create serve_duration metric");

        let refresh_total = IntCounterVec::new(
            Opts::new("fsnap_refresh_total", "Admin refresh requests by outcome"),
            &["outcome"],
        )
        .expect("failed to create refresh_total metric");

        let upstream_errors = IntCounterVec::new(
            Opts::new("fsnap_upstream_errors_total", "Upstream fetch failures by kind"),
            &["kind"],
        )
        .expect("failed to create upstream_errors metric");

        registry
            .register(Box::new(serves_total.clone()))
            .expect("failed to register serves_total");
        registry
            .register(Box::new(serve_duration.clone()))
            .expect("failed to register serve_duration");
        registry
            .register(Box::new(refresh_total.clone()))
            .expect("failed to register refresh_total");
        registry
            .register(Box::new(upstream_errors.clone()))
            .expect("failed to register upstream_errors");

        Self {
            serves_total,
            serve_duration,
            refresh_total,
            upstream_errors,
        }
    }
}

/// Access the process-wide metrics, initializing them on first use.
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| Metrics::new(REGISTRY.get_or_init(Registry::new)))
}

/// GET /metrics, Prometheus text exposition.
pub async fn handle_metrics() -> Response {
    metrics(); // make sure everything is registered
    let registry = REGISTRY.get_or_init(Registry::new);
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encoding failed: {}", e),
        )
            .into_response();
    }
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        buffer,
    )
        .into_response()
}
