//! # Backend Registry
//!
//! Maps `backendType` names onto backend instances.

use super::aws::{AwsSessionFactory, ParameterStoreBackend, SecretsManagerBackend};
use super::azure::AzureKeyVaultBackend;
use super::gcp::GcpSecretManagerBackend;
use super::vault::VaultBackend;
use super::Backend;
use crate::config::BackendSettings;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Supported backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendType {
    SecretsManager,
    SystemManager,
    Vault,
    AzureKeyVault,
    GcpSecretsManager,
}

impl BackendType {
    pub const ALL: [BackendType; 5] = [
        BackendType::SecretsManager,
        BackendType::SystemManager,
        BackendType::Vault,
        BackendType::AzureKeyVault,
        BackendType::GcpSecretsManager,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BackendType::SecretsManager => "secretsManager",
            BackendType::SystemManager => "systemManager",
            BackendType::Vault => "vault",
            BackendType::AzureKeyVault => "azureKeyVault",
            BackendType::GcpSecretsManager => "gcpSecretsManager",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = BackendLookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "secretsManager" | "secretManager" => Ok(BackendType::SecretsManager),
            "systemManager" => Ok(BackendType::SystemManager),
            "vault" => Ok(BackendType::Vault),
            "azureKeyVault" => Ok(BackendType::AzureKeyVault),
            "gcpSecretsManager" => Ok(BackendType::GcpSecretsManager),
            other => Err(BackendLookupError::Unknown(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendLookupError {
    #[error("spec.backendType is not set")]
    Missing,
    #[error("Unknown backend type '{0}'")]
    Unknown(String),
    #[error("Backend '{0}' is not configured")]
    NotConfigured(BackendType),
}

/// Backends available to pollers, keyed by type
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendType, Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, backend_type: BackendType, backend: Arc<dyn Backend>) {
        self.backends.insert(backend_type, backend);
    }

    #[must_use]
    pub fn with_backend(mut self, backend_type: BackendType, backend: Arc<dyn Backend>) -> Self {
        self.insert(backend_type, backend);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Resolve the backend named by an ExternalSecret's `backendType`
    pub fn resolve(
        &self,
        backend_type: Option<&str>,
    ) -> Result<(BackendType, Arc<dyn Backend>), BackendLookupError> {
        let backend_type: BackendType = backend_type
            .filter(|s| !s.is_empty())
            .ok_or(BackendLookupError::Missing)?
            .parse()?;
        self.backends
            .get(&backend_type)
            .map(|backend| (backend_type, Arc::clone(backend)))
            .ok_or(BackendLookupError::NotConfigured(backend_type))
    }
}

/// Build every backend from process settings
///
/// A backend that cannot be initialized is left out and logged; ExternalSecrets
/// that select it fail their syncs with [`BackendLookupError::NotConfigured`].
pub async fn build_backends(settings: &BackendSettings) -> BackendRegistry {
    let mut registry = BackendRegistry::new();

    let aws = Arc::new(AwsSessionFactory::from_settings(&settings.aws).await);
    registry.insert(
        BackendType::SecretsManager,
        Arc::new(SecretsManagerBackend::new(Arc::clone(&aws))),
    );
    registry.insert(
        BackendType::SystemManager,
        Arc::new(ParameterStoreBackend::new(aws)),
    );

    match VaultBackend::new(settings.vault.clone()) {
        Ok(vault) => registry.insert(BackendType::Vault, Arc::new(vault)),
        Err(e) => warn!("Vault backend disabled: {e:#}"),
    }

    match AzureKeyVaultBackend::new(settings.azure_key_vault_endpoint.clone()) {
        Ok(azure) => registry.insert(BackendType::AzureKeyVault, Arc::new(azure)),
        Err(e) => warn!("Azure Key Vault backend disabled: {e:#}"),
    }

    match GcpSecretManagerBackend::new(settings.gcp.clone()) {
        Ok(gcp) => registry.insert(BackendType::GcpSecretsManager, Arc::new(gcp)),
        Err(e) => warn!("GCP Secret Manager backend disabled: {e:#}"),
    }

    info!(
        "✅ Secret backends ready: {}",
        BackendType::ALL
            .iter()
            .filter(|t| registry.backends.contains_key(*t))
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    registry
}
