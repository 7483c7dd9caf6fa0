//! Prometheus metrics for the Gatehouse server.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry no principal names, agent ids or parameter values, but they
//! do expose aggregate usage (statement counts, filter outcomes).
//!
//! **Deployment Requirement**: The `/metrics` endpoint MUST be network-restricted
//! to authorized Prometheus scraper IPs only.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Registry metrics
pub static CATEGORIES_REGISTERED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gatehouse_categories_registered_total",
        "Total number of categories assigned a new id",
    )
    .expect("metric creation failed")
});

pub static CATEGORY_REGISTRATION_HITS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gatehouse_category_registration_hits_total",
        "Total number of registrations answered with an existing category id",
    )
    .expect("metric creation failed")
});

pub static STATEMENTS_PREPARED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gatehouse_statements_prepared_total",
        "Total number of descriptors compiled into new statements",
    )
    .expect("metric creation failed")
});

pub static STATEMENT_CACHE_HITS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gatehouse_statement_cache_hits_total",
        "Total number of prepare requests answered from the statement cache",
    )
    .expect("metric creation failed")
});

pub static STATEMENTS_REJECTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gatehouse_statements_rejected_total",
            "Total prepare requests rejected, by reason",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

// Execution metrics
pub static EXECUTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gatehouse_executions_total",
            "Total statement executions by statement kind",
        ),
        &["kind"],
    )
    .expect("metric creation failed")
});

pub static ILLEGAL_PATCHES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gatehouse_illegal_patches_total",
        "Total executions rejected because parameters did not fit the statement",
    )
    .expect("metric creation failed")
});

pub static FILTER_DECISIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gatehouse_filter_decisions_total",
            "Authorization filter decisions on reads by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static EXECUTION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "gatehouse_execution_duration_seconds",
            "Time taken to execute a prepared statement",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["operation"],
    )
    .expect("metric creation failed")
});

// Delegation token metrics
pub static TOKENS_ISSUED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gatehouse_tokens_issued_total",
        "Total number of delegation tokens issued",
    )
    .expect("metric creation failed")
});

pub static TOKEN_VERIFICATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gatehouse_token_verifications_total",
            "Delegation token verifications by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// This function is idempotent - subsequent calls after the first are no-ops.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(CATEGORIES_REGISTERED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CATEGORY_REGISTRATION_HITS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STATEMENTS_PREPARED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STATEMENT_CACHE_HITS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STATEMENTS_REJECTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(EXECUTIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ILLEGAL_PATCHES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(FILTER_DECISIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(EXECUTION_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(TOKENS_ISSUED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(TOKEN_VERIFICATIONS.clone()))
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

pub fn record_category_registration(cached: bool) {
    if cached {
        CATEGORY_REGISTRATION_HITS.inc();
    } else {
        CATEGORIES_REGISTERED.inc();
    }
}

pub fn record_rejected_statement(reason: &str) {
    STATEMENTS_REJECTED.with_label_values(&[reason]).inc();
}

pub fn record_execution(kind: &str) {
    EXECUTIONS.with_label_values(&[kind]).inc();
}

pub fn record_filter_decision(outcome: &str) {
    FILTER_DECISIONS.with_label_values(&[outcome]).inc();
}

pub fn record_token_verification(verified: bool) {
    let outcome = if verified { "verified" } else { "rejected" };
    TOKEN_VERIFICATIONS.with_label_values(&[outcome]).inc();
}
