//! # Secret Backends
//!
//! Pluggable external secret stores and the shared logic that turns their raw
//! values into an encoded Kubernetes Secret payload.
//!
//! Every backend implements a single capability, [`Backend::fetch_value`].
//! [`Backend::get_secret_manifest_data`] is provided on top of it and is the
//! same for all backends (see [`materialize`]).
//!
//! ## Backends
//!
//! | `backendType`        | Store                                   |
//! |----------------------|-----------------------------------------|
//! | `secretsManager`     | AWS Secrets Manager (`secretManager` is accepted for compatibility) |
//! | `systemManager`      | AWS Systems Manager Parameter Store     |
//! | `vault`              | HashiCorp Vault KV (v1 or v2)           |
//! | `azureKeyVault`      | Azure Key Vault                         |
//! | `gcpSecretsManager`  | Google Cloud Secret Manager             |

pub mod aws;
pub mod azure;
pub mod gcp;
mod materialize;
mod registry;
pub mod vault;

pub use materialize::{encode_value, materialize, MaterializeError, SecretPayload};
pub use registry::{build_backends, BackendLookupError, BackendRegistry, BackendType};

use crate::crd::{ExternalSecretSpec, KeyOptions, SpecOptions};
use async_trait::async_trait;

/// Raw value returned by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretValue {
    Text(String),
    Binary(Vec<u8>),
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        SecretValue::Text(value.to_string())
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        SecretValue::Text(value)
    }
}

impl From<Vec<u8>> for SecretValue {
    fn from(value: Vec<u8>) -> Self {
        SecretValue::Binary(value)
    }
}

/// A source of secret values
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Fetch the value stored under `key`
    ///
    /// `key_options` come from the data entry (version, binary flag, ...),
    /// `spec_options` from the ExternalSecret spec (role, vault, project, ...).
    async fn fetch_value(
        &self,
        key: &str,
        key_options: &KeyOptions,
        spec_options: &SpecOptions,
    ) -> anyhow::Result<SecretValue>;

    /// Fetch and encode every value declared by `spec`
    async fn get_secret_manifest_data(
        &self,
        spec: &ExternalSecretSpec,
    ) -> Result<SecretPayload, MaterializeError> {
        materialize(self, spec).await
    }
}
