//! # Controller Metrics
//!
//! Metrics for the daemon: poller registry size and watch stream restarts.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{IntCounterVec, IntGauge};
use std::sync::LazyLock;

static POLLERS_ACTIVE: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "external_secrets_pollers_active",
        "Current number of running ExternalSecret pollers",
    )
    .expect("Failed to create POLLERS_ACTIVE metric - this should never happen")
});

static WATCH_RESTARTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "external_secrets_watch_restarts_total",
            "Total number of ExternalSecret watch stream restarts",
        ),
        &["reason"],
    )
    .expect("Failed to create WATCH_RESTARTS_TOTAL metric - this should never happen")
});

/// Register controller metrics with the registry
pub(crate) fn register_controller_metrics() -> Result<()> {
    REGISTRY.register(Box::new(POLLERS_ACTIVE.clone()))?;
    REGISTRY.register(Box::new(WATCH_RESTARTS_TOTAL.clone()))?;
    Ok(())
}

pub fn set_pollers_active(count: usize) {
    POLLERS_ACTIVE.set(i64::try_from(count).unwrap_or(i64::MAX));
}

pub fn increment_watch_restarts(reason: &str) {
    WATCH_RESTARTS_TOTAL.with_label_values(&[reason]).inc();
}
