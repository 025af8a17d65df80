//! # Sync Metrics
//!
//! Outcome of each poller tick, labelled by ExternalSecret and backend.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{IntCounterVec, IntGaugeVec};
use std::fmt;
use std::sync::LazyLock;

static SYNC_CALLS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new("sync_calls", "number of sync operations"),
        &["name", "namespace", "backend", "status"],
    )
    .expect("Failed to create SYNC_CALLS metric - this should never happen")
});

static LAST_STATE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new(
            "last_state",
            "Value -1 if the last sync was a failure, 1 otherwise.",
        ),
        &["name", "namespace", "backend"],
    )
    .expect("Failed to create LAST_STATE metric - this should never happen")
});

/// Register sync metrics with the registry
pub(crate) fn register_sync_metrics() -> Result<()> {
    REGISTRY.register(Box::new(SYNC_CALLS.clone()))?;
    REGISTRY.register(Box::new(LAST_STATE.clone()))?;
    Ok(())
}

/// Result of one sync tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
        }
    }

    fn gauge_value(self) -> i64 {
        match self {
            SyncStatus::Success => 1,
            SyncStatus::Failed => -1,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels identifying one sync observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncObservation {
    pub name: String,
    pub namespace: String,
    pub backend: String,
    pub status: SyncStatus,
}

/// Sink for sync outcomes, shared by every poller
pub trait MetricsSink: Send + Sync + fmt::Debug {
    fn record_sync(&self, observation: &SyncObservation);
}

/// `MetricsSink` backed by the global Prometheus registry
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl MetricsSink for PrometheusMetrics {
    fn record_sync(&self, observation: &SyncObservation) {
        observe_sync(observation);
    }
}

/// Increment `sync_calls` and set `last_state` for one tick
pub fn observe_sync(observation: &SyncObservation) {
    let SyncObservation {
        name,
        namespace,
        backend,
        status,
    } = observation;
    SYNC_CALLS
        .with_label_values(&[name.as_str(), namespace.as_str(), backend.as_str(), status.as_str()])
        .inc();
    LAST_STATE
        .with_label_values(&[name.as_str(), namespace.as_str(), backend.as_str()])
        .set(status.gauge_value());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(status: SyncStatus) -> SyncObservation {
        SyncObservation {
            name: "metrics-test".to_string(),
            namespace: "metrics-ns".to_string(),
            backend: "vault".to_string(),
            status,
        }
    }

    #[test]
    fn test_observe_sync_success() {
        let labels = ["metrics-test", "metrics-ns", "vault", "success"];
        let before = SYNC_CALLS.with_label_values(&labels).get();
        observe_sync(&observation(SyncStatus::Success));
        assert_eq!(SYNC_CALLS.with_label_values(&labels).get(), before + 1);
        assert_eq!(
            LAST_STATE
                .with_label_values(&["metrics-test", "metrics-ns", "vault"])
                .get(),
            1
        );
    }

    #[test]
    fn test_observe_sync_failure_sets_negative_state() {
        let observation = SyncObservation {
            name: "metrics-failure".to_string(),
            ..observation(SyncStatus::Failed)
        };
        observe_sync(&observation);
        assert_eq!(
            SYNC_CALLS
                .with_label_values(&["metrics-failure", "metrics-ns", "vault", "failed"])
                .get(),
            1
        );
        assert_eq!(
            LAST_STATE
                .with_label_values(&["metrics-failure", "metrics-ns", "vault"])
                .get(),
            -1
        );
    }
}
