//! Prometheus metrics for the tack server.
//!
//! Exposes metrics for push processing, per-mutation outcomes, and pull
//! traffic.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry no tenant data (no org IDs, board names, or client IDs),
//! but they do expose aggregate system usage.
//!
//! **Deployment Requirement**: The `/metrics` endpoint MUST be
//! network-restricted to authorized Prometheus scraper IPs only. This should
//! be enforced at the infrastructure level (firewall, load balancer, or
//! reverse proxy rules). Do NOT expose `/metrics` on public networks.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};
use tack_core::OutcomeStatus;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Push metrics
pub static PUSHES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "tack_pushes_total",
        "Total number of push batches processed",
    )
    .expect("metric creation failed")
});

pub static MUTATION_OUTCOMES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tack_mutation_outcomes_total",
            "Total mutation outcomes by classification",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static PUSH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "tack_push_duration_seconds",
            "Time taken to process a push batch",
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
    )
    .expect("metric creation failed")
});

pub static PUSH_BATCH_SIZE: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "tack_push_batch_size",
            "Number of mutations per push batch",
        )
        .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 256.0]),
    )
    .expect("metric creation failed")
});

// Pull metrics
pub static PULLS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("tack_pulls_total", "Total number of pull requests served")
        .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// This function is idempotent - subsequent calls after the first are no-ops.
/// This allows safe use in integration tests or when embedding multiple routers.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(PUSHES_TOTAL.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MUTATION_OUTCOMES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PUSH_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PUSH_BATCH_SIZE.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PULLS_TOTAL.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record one mutation outcome.
pub fn record_mutation_outcome(outcome: OutcomeStatus) {
    let label = match outcome {
        OutcomeStatus::Applied => "applied",
        OutcomeStatus::SkippedDuplicate => "skipped_duplicate",
        OutcomeStatus::Rejected => "rejected",
        OutcomeStatus::Fatal => "fatal",
    };
    MUTATION_OUTCOMES.with_label_values(&[label]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // This would panic if any metric creation failed
        register_metrics();
        register_metrics();
    }

    #[test]
    fn test_outcome_labels_cover_all_variants() {
        for outcome in [
            OutcomeStatus::Applied,
            OutcomeStatus::SkippedDuplicate,
            OutcomeStatus::Rejected,
            OutcomeStatus::Fatal,
        ] {
            record_mutation_outcome(outcome);
        }
    }
}
