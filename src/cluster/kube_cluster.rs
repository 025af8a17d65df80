//! API server implementation of the cluster collaborators.

use super::{PermissionSource, SecretSink, StatusSink};
use crate::constants::FIELD_MANAGER;
use crate::crd::{ExternalSecret, ExternalSecretStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster").finish_non_exhaustive()
    }
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretSink for KubeCluster {
    async fn apply(&self, namespace: &str, name: &str, secret: &Secret) -> Result<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.patch(name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(secret))
            .await
            .with_context(|| format!("Failed to apply Secret {namespace}/{name}"))?;
        debug!("Applied Secret {}/{}", namespace, name);
        Ok(())
    }
}

#[async_trait]
impl PermissionSource for KubeCluster {
    async fn namespace_annotations(&self, namespace: &str) -> Result<BTreeMap<String, String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let ns = api
            .get(namespace)
            .await
            .with_context(|| format!("Failed to get namespace {namespace}"))?;
        Ok(ns.metadata.annotations.unwrap_or_default())
    }
}

#[async_trait]
impl StatusSink for KubeCluster {
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ExternalSecretStatus,
    ) -> Result<()> {
        let api: Api<ExternalSecret> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({
            "status": status
        });
        api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .with_context(|| format!("Failed to update status of ExternalSecret {namespace}/{name}"))?;
        Ok(())
    }
}
