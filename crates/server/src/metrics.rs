//! Prometheus metrics
//!
//! Counters and histograms are recorded with the `metrics` macros where the
//! events happen; this module installs the exporter and serves `/metrics`.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

const LATENCY_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Install the global Prometheus recorder.
///
/// Returns `None` when a recorder is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    let builder = match PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("finassist_llm_latency_seconds".to_string()),
        LATENCY_BUCKETS,
    ) {
        Ok(builder) => builder,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid histogram buckets, using summaries");
            PrometheusBuilder::new()
        }
    };

    match builder.install_recorder() {
        Ok(handle) => {
            describe_metrics();
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
            None
        }
    }
}

fn describe_metrics() {
    metrics::describe_counter!("finassist_turns_total", "User messages handled");
    metrics::describe_counter!(
        "finassist_extraction_fallbacks_total",
        "Turns where LLM extraction failed and the keyword fallback was used"
    );
    metrics::describe_counter!(
        "finassist_transfers_completed_total",
        "Transfer requests produced"
    );
    metrics::describe_counter!(
        "finassist_sessions_cancelled_total",
        "Conversations cancelled by the user"
    );
    metrics::describe_histogram!(
        "finassist_llm_latency_seconds",
        metrics::Unit::Seconds,
        "Completion provider latency"
    );
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
