//! One sync tick.

use super::permissions::{PermissionDenied, PermissionPolicy};
use crate::backend::{BackendLookupError, BackendRegistry, MaterializeError};
use crate::cluster::{build_secret_manifest, PermissionSource, SecretSink, StatusSink};
use crate::config::ControllerConfig;
use crate::crd::{Condition, ExternalSecret, ExternalSecretStatus};
use crate::observability::metrics::{MetricsSink, SyncObservation, SyncStatus};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Backend(#[from] BackendLookupError),
    #[error("Failed to read namespace {namespace}: {source:#}")]
    Namespace {
        namespace: String,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    PermissionDenied(#[from] PermissionDenied),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error("Failed to build Secret manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("{0:#}")]
    Apply(anyhow::Error),
    #[error("Sync did not finish within {0:?}")]
    Timeout(Duration),
}

impl SyncError {
    /// Reason recorded on the `Ready` condition
    pub fn reason(&self) -> &'static str {
        match self {
            SyncError::PermissionDenied(_) => "PolicyDenied",
            _ => "SyncFailed",
        }
    }
}

/// Collaborators and settings shared by every poller
#[derive(Clone)]
pub struct PollerContext {
    pub backends: Arc<BackendRegistry>,
    pub secrets: Arc<dyn SecretSink>,
    pub namespaces: Arc<dyn PermissionSource>,
    pub statuses: Arc<dyn StatusSink>,
    pub metrics: Arc<dyn MetricsSink>,
    pub policy: PermissionPolicy,
    pub interval: Duration,
    pub polling_disabled: bool,
}

impl std::fmt::Debug for PollerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollerContext")
            .field("backends", &self.backends)
            .field("policy", &self.policy)
            .field("interval", &self.interval)
            .field("polling_disabled", &self.polling_disabled)
            .finish_non_exhaustive()
    }
}

impl PollerContext {
    pub fn new<C>(
        config: &ControllerConfig,
        backends: Arc<BackendRegistry>,
        cluster: Arc<C>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self
    where
        C: SecretSink + PermissionSource + StatusSink + 'static,
    {
        Self {
            backends,
            secrets: Arc::clone(&cluster) as Arc<dyn SecretSink>,
            namespaces: Arc::clone(&cluster) as Arc<dyn PermissionSource>,
            statuses: cluster,
            metrics,
            policy: PermissionPolicy::from_config(config),
            interval: config.poller_interval,
            polling_disabled: config.polling_disabled,
        }
    }
}

/// Status fields that decide whether the status subresource must be patched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportedStatus {
    status: Option<String>,
    observed_generation: Option<i64>,
}

impl ReportedStatus {
    /// What the resource already carries, so restarts do not re-patch unchanged status
    pub fn from_resource(resource: &ExternalSecret) -> Self {
        let status = resource.status.as_ref();
        Self {
            status: status.and_then(|s| s.status.clone()),
            observed_generation: status.and_then(|s| s.observed_generation),
        }
    }
}

/// Fetch, check and apply once
pub async fn sync_once(ctx: &PollerContext, resource: &ExternalSecret) -> Result<(), SyncError> {
    let namespace = resource.namespace_or_default();
    let name = resource.name_or_unknown();

    let (backend_type, backend) = ctx.backends.resolve(resource.spec.backend_type.as_deref())?;

    let annotations = ctx
        .namespaces
        .namespace_annotations(namespace)
        .await
        .map_err(|source| SyncError::Namespace {
            namespace: namespace.to_string(),
            source,
        })?;
    ctx.policy.check(&resource.spec, &annotations)?;

    debug!("Fetching secret data from {}", backend_type);
    let payload = backend.get_secret_manifest_data(&resource.spec).await?;

    let secret = build_secret_manifest(resource, &payload)?;
    ctx.secrets
        .apply(namespace, name, &secret)
        .await
        .map_err(SyncError::Apply)?;

    Ok(())
}

/// Run one bounded sync, record its outcome and report status changes
pub async fn run_tick(
    ctx: &PollerContext,
    resource: &ExternalSecret,
    reported: &mut ReportedStatus,
) -> SyncStatus {
    let namespace = resource.namespace_or_default();
    let name = resource.name_or_unknown();
    let span = info_span!("sync", externalsecret.name = name, namespace = namespace);

    async move {
        let result = match tokio::time::timeout(ctx.interval, sync_once(ctx, resource)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(ctx.interval)),
        };

        let sync_status = match &result {
            Ok(()) => {
                info!("✅ Synced ExternalSecret {}/{}", namespace, name);
                SyncStatus::Success
            }
            Err(e @ SyncError::PermissionDenied(_)) => {
                warn!("Not syncing ExternalSecret {}/{}: {}", namespace, name, e);
                SyncStatus::Failed
            }
            Err(e) => {
                error!("❌ Failed to sync ExternalSecret {}/{}: {}", namespace, name, e);
                SyncStatus::Failed
            }
        };

        ctx.metrics.record_sync(&SyncObservation {
            name: name.to_string(),
            namespace: namespace.to_string(),
            backend: resource
                .spec
                .backend_type
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            status: sync_status,
        });

        report_status(ctx, resource, result.as_ref().err(), reported).await;

        sync_status
    }
    .instrument(span)
    .await
}

async fn report_status(
    ctx: &PollerContext,
    resource: &ExternalSecret,
    error: Option<&SyncError>,
    reported: &mut ReportedStatus,
) {
    let status_text = match error {
        None => "SUCCESS".to_string(),
        Some(e) => format!("ERROR, {e}"),
    };
    let next = ReportedStatus {
        status: Some(status_text.clone()),
        observed_generation: resource.metadata.generation,
    };

    if next == *reported {
        debug!("Skipping status update - status unchanged");
        return;
    }

    let now = chrono::Utc::now().to_rfc3339();
    let status = ExternalSecretStatus {
        last_sync: Some(now.clone()),
        status: Some(status_text),
        observed_generation: resource.metadata.generation,
        conditions: vec![Condition {
            r#type: "Ready".to_string(),
            status: if error.is_none() { "True" } else { "False" }.to_string(),
            last_transition_time: Some(now),
            reason: Some(error.map_or("SyncSucceeded", SyncError::reason).to_string()),
            message: error.map(ToString::to_string),
        }],
    };

    match ctx
        .statuses
        .patch_status(resource.namespace_or_default(), resource.name_or_unknown(), &status)
        .await
    {
        Ok(()) => *reported = next,
        Err(e) => warn!("Failed to update ExternalSecret status: {:#}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason() {
        let denied = SyncError::PermissionDenied(PermissionDenied {
            reason: "no".to_string(),
        });
        assert_eq!(denied.reason(), "PolicyDenied");
        assert_eq!(SyncError::Backend(BackendLookupError::Missing).reason(), "SyncFailed");
    }

    #[test]
    fn test_reported_status_from_resource() {
        let mut resource = ExternalSecret::new("a", Default::default());
        assert_eq!(ReportedStatus::from_resource(&resource), ReportedStatus::default());

        resource.status = Some(ExternalSecretStatus {
            status: Some("SUCCESS".to_string()),
            observed_generation: Some(3),
            ..Default::default()
        });
        let reported = ReportedStatus::from_resource(&resource);
        assert_eq!(reported.status.as_deref(), Some("SUCCESS"));
        assert_eq!(reported.observed_generation, Some(3));
    }
}
