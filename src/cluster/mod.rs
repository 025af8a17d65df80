//! # Cluster Collaborators
//!
//! Everything a poller needs from the Kubernetes API, behind traits so the
//! sync logic can run against in-memory fakes.

mod kube_cluster;
mod manifest;

pub use kube_cluster::KubeCluster;
pub use manifest::build_secret_manifest;

use crate::crd::ExternalSecretStatus;
use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use std::collections::BTreeMap;

/// Creates or updates generated Secrets
#[async_trait]
pub trait SecretSink: Send + Sync {
    async fn apply(&self, namespace: &str, name: &str, secret: &Secret) -> Result<()>;
}

/// Reads namespace annotations for the permission policy
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn namespace_annotations(&self, namespace: &str) -> Result<BTreeMap<String, String>>;
}

/// Writes the ExternalSecret status subresource
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ExternalSecretStatus,
    ) -> Result<()>;
}
