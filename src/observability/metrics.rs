//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `media_config_reconciliations_total` - Reconciliation passes by service type
//! - `media_config_reconciliation_errors_total` - Passes that ended in an error, by service type
//! - `media_config_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `media_config_changes_total` - Changes applied to backends, by service type and result
//! - `media_config_registrations_total` - Registration coordinator outcomes
//! - `media_config_duration_parsing_errors_total` - Unparseable reconciliation intervals
//! - `media_config_requeues_total` - Requeues by reason

use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "media_config_reconciliations_total",
            "Total number of reconciliations",
        ),
        &["service_type"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "media_config_reconciliation_errors_total",
            "Total number of reconciliation errors",
        ),
        &["service_type"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "media_config_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["service_type"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static CHANGES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "media_config_changes_total",
            "Total number of changes applied to backend services",
        ),
        &["service_type", "result"],
    )
    .expect("Failed to create CHANGES_TOTAL metric - this should never happen")
});

static REGISTRATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "media_config_registrations_total",
            "Total number of registration decisions by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create REGISTRATIONS_TOTAL metric - this should never happen")
});

static DURATION_PARSING_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "media_config_duration_parsing_errors_total",
        "Total number of duration parsing errors (reconciliation interval parsing failures)",
    )
    .expect("Failed to create DURATION_PARSING_ERRORS_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "media_config_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(CHANGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REGISTRATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DURATION_PARSING_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(service_type: &str) {
    RECONCILIATIONS_TOTAL
        .with_label_values(&[service_type])
        .inc();
}

pub fn increment_reconciliation_errors(service_type: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[service_type])
        .inc();
}

pub fn observe_reconciliation_duration(service_type: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[service_type])
        .observe(duration);
}

pub fn record_changes(service_type: &str, applied: usize, failed: usize) {
    CHANGES_TOTAL
        .with_label_values(&[service_type, "applied"])
        .inc_by(applied as u64);
    CHANGES_TOTAL
        .with_label_values(&[service_type, "failed"])
        .inc_by(failed as u64);
}

pub fn increment_registrations(outcome: &str) {
    REGISTRATIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_duration_parsing_errors() {
    DURATION_PARSING_ERRORS_TOTAL.inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
