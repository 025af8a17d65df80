//! # Azure Key Vault Backend
//!
//! Reads secrets through the Key Vault REST API.
//!
//! Spec options:
//! - `keyVaultName`: vault name or full vault URL (required)
//!
//! Key options:
//! - `version`: pin a secret version
//! - `isBinary`: the stored value is base64 and is decoded before use

use super::auth::create_credential;
use crate::backend::{Backend, SecretValue};
use crate::crd::{KeyOptions, SpecOptions};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use azure_core::credentials::{TokenCredential, TokenRequestOptions};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug_span, info, Instrument};

const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";
const KEY_VAULT_API_VERSION: &str = "7.4";

#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: Option<String>,
}

pub struct AzureKeyVaultBackend {
    http: ReqwestClient,
    credential: Arc<dyn TokenCredential>,
    endpoint_override: Option<String>,
}

impl std::fmt::Debug for AzureKeyVaultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureKeyVaultBackend")
            .field("endpoint_override", &self.endpoint_override)
            .finish_non_exhaustive()
    }
}

impl AzureKeyVaultBackend {
    pub fn new(endpoint_override: Option<String>) -> Result<Self> {
        let credential = create_credential()?;
        let http = ReqwestClient::builder()
            .build()
            .context("Failed to create HTTP client")?;

        if let Some(endpoint) = &endpoint_override {
            info!("Routing Azure Key Vault requests to {}", endpoint);
        }

        Ok(Self {
            http,
            credential,
            endpoint_override,
        })
    }

    fn vault_url(&self, vault_name: &str) -> String {
        vault_url(self.endpoint_override.as_deref(), vault_name)
    }
}

/// Vault base URL with a trailing slash
fn vault_url(endpoint_override: Option<&str>, vault_name: &str) -> String {
    let url = match endpoint_override {
        Some(endpoint) => endpoint.to_string(),
        None if vault_name.starts_with("https://") => vault_name.to_string(),
        None => format!("https://{vault_name}.vault.azure.net/"),
    };
    if url.ends_with('/') {
        url
    } else {
        format!("{url}/")
    }
}

fn decode_value(value: String, is_binary: bool) -> Result<SecretValue> {
    if is_binary {
        let bytes = BASE64
            .decode(value.trim())
            .context("isBinary is set but the secret value is not valid base64")?;
        Ok(SecretValue::Binary(bytes))
    } else {
        Ok(SecretValue::Text(value))
    }
}

#[async_trait]
impl Backend for AzureKeyVaultBackend {
    async fn fetch_value(
        &self,
        key: &str,
        key_options: &KeyOptions,
        spec_options: &SpecOptions,
    ) -> Result<SecretValue> {
        let vault_name = spec_options
            .get_str("keyVaultName")
            .ok_or_else(|| anyhow!("spec.keyVaultName is required for azureKeyVault"))?;
        let span = debug_span!("azure.keyvault.secret.get", secret.name = key, vault.name = &*vault_name);

        async move {
            let token_response = self
                .credential
                .get_token(&[KEY_VAULT_SCOPE], Some(TokenRequestOptions::default()))
                .await
                .context("Failed to get Azure Key Vault access token")?;
            let token = token_response.token.secret().to_string();

            let mut url = format!("{}secrets/{}", self.vault_url(&vault_name), key);
            if let Some(version) = key_options.get_str("version") {
                url.push('/');
                url.push_str(&version);
            }

            let response = self
                .http
                .get(&url)
                .query(&[("api-version", KEY_VAULT_API_VERSION)])
                .header("Authorization", format!("Bearer {token}"))
                .send()
                .await
                .context("Failed to reach Azure Key Vault")?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                bail!("Failed to get Azure secret {key}: HTTP {status} - {error_text}");
            }

            let bundle: SecretBundle = response
                .json()
                .await
                .context("Failed to deserialize Azure secret response")?;
            let value = bundle
                .value
                .with_context(|| format!("Azure secret {key} has no value"))?;

            decode_value(value, key_options.get_bool("isBinary"))
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_url_construction() {
        assert_eq!(vault_url(None, "my-vault"), "https://my-vault.vault.azure.net/");
        assert_eq!(
            vault_url(None, "https://custom-vault.vault.azure.net"),
            "https://custom-vault.vault.azure.net/"
        );
        assert_eq!(
            vault_url(Some("http://localhost:1234"), "my-vault"),
            "http://localhost:1234/"
        );
    }

    #[test]
    fn test_binary_values_are_decoded() {
        assert_eq!(
            decode_value("3q2+7w==".to_string(), true).unwrap(),
            SecretValue::Binary(vec![0xde, 0xad, 0xbe, 0xef])
        );
        assert_eq!(
            decode_value("plain".to_string(), false).unwrap(),
            SecretValue::Text("plain".to_string())
        );
        assert!(decode_value("not base64!".to_string(), true).is_err());
    }
}
