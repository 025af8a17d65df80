//! In-memory collaborators shared by the integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use external_secrets_controller::backend::{Backend, BackendRegistry, BackendType, SecretValue};
use external_secrets_controller::cluster::{PermissionSource, SecretSink, StatusSink};
use external_secrets_controller::crd::{ExternalSecret, ExternalSecretStatus, KeyOptions, SpecOptions};
use external_secrets_controller::observability::metrics::{MetricsSink, SyncObservation};
use external_secrets_controller::poller::{PermissionPolicy, PollerContext};
use k8s_openapi::api::core::v1::Secret;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn external_secret(name: &str, uid: &str, spec: Value) -> ExternalSecret {
    let mut resource = ExternalSecret::new(name, serde_json::from_value(spec).unwrap());
    resource.metadata.namespace = Some("default".to_string());
    resource.metadata.uid = Some(uid.to_string());
    resource.metadata.generation = Some(1);
    resource
}

/// Backend serving fixed values, optionally slowly
#[derive(Debug, Default)]
pub struct MapBackend {
    values: HashMap<String, SecretValue>,
    delay: Option<Duration>,
}

impl MapBackend {
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), SecretValue::Text(value.to_string()));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Backend for MapBackend {
    async fn fetch_value(
        &self,
        key: &str,
        _key_options: &KeyOptions,
        _spec_options: &SpecOptions,
    ) -> Result<SecretValue> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("key {key} not found"))
    }
}

#[derive(Debug, Default)]
pub struct FakeCluster {
    pub annotations: Mutex<BTreeMap<String, String>>,
    pub applied: Mutex<Vec<(String, String, Secret)>>,
    pub statuses: Mutex<Vec<ExternalSecretStatus>>,
    pub fail_apply: AtomicBool,
}

impl FakeCluster {
    pub fn annotate(&self, key: &str, value: &str) {
        self.annotations
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn applied_count(&self) -> usize {
        self.applied.lock().unwrap().len()
    }

    pub fn status_count(&self) -> usize {
        self.statuses.lock().unwrap().len()
    }

    pub fn last_status(&self) -> Option<ExternalSecretStatus> {
        self.statuses.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SecretSink for FakeCluster {
    async fn apply(&self, namespace: &str, name: &str, secret: &Secret) -> Result<()> {
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(anyhow!("apply rejected"));
        }
        self.applied
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string(), secret.clone()));
        Ok(())
    }
}

#[async_trait]
impl PermissionSource for FakeCluster {
    async fn namespace_annotations(&self, _namespace: &str) -> Result<BTreeMap<String, String>> {
        Ok(self.annotations.lock().unwrap().clone())
    }
}

#[async_trait]
impl StatusSink for FakeCluster {
    async fn patch_status(
        &self,
        _namespace: &str,
        _name: &str,
        status: &ExternalSecretStatus,
    ) -> Result<()> {
        self.statuses.lock().unwrap().push(status.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingMetrics {
    pub observations: Mutex<Vec<SyncObservation>>,
}

impl MetricsSink for RecordingMetrics {
    fn record_sync(&self, observation: &SyncObservation) {
        self.observations.lock().unwrap().push(observation.clone());
    }
}

pub struct Harness {
    pub cluster: Arc<FakeCluster>,
    pub metrics: Arc<RecordingMetrics>,
    pub context: PollerContext,
}

pub fn harness(backend: MapBackend, interval: Duration, enforce: bool) -> Harness {
    let cluster = Arc::new(FakeCluster::default());
    let metrics = Arc::new(RecordingMetrics::default());
    let backends = BackendRegistry::new().with_backend(BackendType::SecretsManager, Arc::new(backend));
    let context = PollerContext {
        backends: Arc::new(backends),
        secrets: cluster.clone(),
        namespaces: cluster.clone(),
        statuses: cluster.clone(),
        metrics: metrics.clone(),
        policy: PermissionPolicy {
            role_annotation: "iam.amazonaws.com/permitted".to_string(),
            naming_annotation: "externalsecrets.kubernetes-client.io/permitted-key-name".to_string(),
            enforce_namespace_annotation: enforce,
        },
        interval,
        polling_disabled: false,
    };
    Harness {
        cluster,
        metrics,
        context,
    }
}
