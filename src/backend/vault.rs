//! # HashiCorp Vault Backend
//!
//! Authenticates with Vault's Kubernetes auth method using the pod's service
//! account token, then reads KV v1 or v2 secrets.
//!
//! Spec options:
//! - `vaultMountPoint`: Kubernetes auth mount (default from `DEFAULT_VAULT_MOUNT_POINT`)
//! - `vaultRole`: role to log in as (default from `DEFAULT_VAULT_ROLE`)
//! - `kvVersion`: 1 or 2 (default 2)
//!
//! Tokens are cached per (mount point, role) and renewed by logging in again
//! once fewer than `VAULT_TOKEN_RENEW_THRESHOLD` seconds remain.

use super::{Backend, SecretValue};
use crate::config::VaultSettings;
use crate::constants::SERVICE_ACCOUNT_TOKEN_PATH;
use crate::crd::{KeyOptions, SpecOptions};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, debug_span, info, Instrument};
use zeroize::Zeroizing;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    auth: LoginAuth,
}

#[derive(Debug, Deserialize)]
struct LoginAuth {
    client_token: String,
    #[serde(default)]
    lease_duration: u64,
}

#[derive(Debug, Deserialize)]
struct ReadResponse {
    data: Option<Value>,
}

struct CachedToken {
    token: Zeroizing<String>,
    /// `None` for tokens that never expire
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn needs_renewal(&self, now: Instant, threshold: Duration) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now + threshold >= expires_at)
    }
}

pub struct VaultBackend {
    http: ReqwestClient,
    settings: VaultSettings,
    jwt_path: PathBuf,
    tokens: Mutex<HashMap<(String, String), CachedToken>>,
}

impl std::fmt::Debug for VaultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultBackend")
            .field("address", &self.settings.address)
            .finish_non_exhaustive()
    }
}

impl VaultBackend {
    pub fn new(settings: VaultSettings) -> Result<Self> {
        let http = ReqwestClient::builder()
            .build()
            .context("Failed to create HTTP client")?;

        info!("Vault backend using {}", settings.address);

        Ok(Self {
            http,
            settings,
            jwt_path: PathBuf::from(SERVICE_ACCOUNT_TOKEN_PATH),
            tokens: Mutex::new(HashMap::new()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}",
            self.settings.address.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.settings.namespace {
            Some(namespace) => builder.header("X-Vault-Namespace", namespace),
            None => builder,
        }
    }

    async fn token(&self, mount_point: &str, role: &str) -> Result<Zeroizing<String>> {
        let mut tokens = self.tokens.lock().await;
        let cache_key = (mount_point.to_string(), role.to_string());
        let threshold = Duration::from_secs(self.settings.token_renew_threshold_secs);

        if let Some(cached) = tokens.get(&cache_key) {
            if !cached.needs_renewal(Instant::now(), threshold) {
                return Ok(cached.token.clone());
            }
        }

        debug!("Logging in to Vault at auth/{}/login as role {}", mount_point, role);

        let jwt = Zeroizing::new(
            tokio::fs::read_to_string(&self.jwt_path)
                .await
                .with_context(|| format!("Failed to read service account token from {}", self.jwt_path.display()))?,
        );

        let response = self
            .request(Method::POST, &format!("auth/{mount_point}/login"))
            .json(&json!({ "role": role, "jwt": jwt.trim() }))
            .send()
            .await
            .context("Failed to reach Vault")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("Vault login failed: HTTP {status} - {error_text}");
        }

        let login: LoginResponse = response
            .json()
            .await
            .context("Failed to parse Vault login response")?;

        let now = Instant::now();
        let expires_at = (login.auth.lease_duration > 0)
            .then(|| now.checked_add(Duration::from_secs(login.auth.lease_duration)))
            .flatten();

        let token = Zeroizing::new(login.auth.client_token);
        tokens.insert(
            cache_key,
            CachedToken {
                token: token.clone(),
                expires_at,
            },
        );

        Ok(token)
    }
}

/// The secret fields inside a KV read response
fn extract_kv_data(kv_version: u64, data: Option<Value>) -> Option<Value> {
    let data = data?;
    match kv_version {
        1 => Some(data),
        _ => match data {
            Value::Object(mut map) => map.remove("data"),
            _ => None,
        },
    }
}

#[async_trait]
impl Backend for VaultBackend {
    async fn fetch_value(
        &self,
        key: &str,
        _key_options: &KeyOptions,
        spec_options: &SpecOptions,
    ) -> Result<SecretValue> {
        let span = debug_span!("vault.kv.read", secret.path = key);

        async move {
            let mount_point = spec_options
                .get_str("vaultMountPoint")
                .unwrap_or(Cow::Borrowed(self.settings.default_mount_point.as_str()));
            let role = spec_options
                .get_str("vaultRole")
                .or_else(|| self.settings.default_role.as_deref().map(Cow::Borrowed))
                .ok_or_else(|| anyhow!("spec.vaultRole is not set and DEFAULT_VAULT_ROLE is empty"))?;
            let kv_version = spec_options.get_u64("kvVersion").unwrap_or(2);

            let token = self.token(&mount_point, &role).await?;

            let response = self
                .request(Method::GET, key)
                .header("X-Vault-Token", token.as_str())
                .send()
                .await
                .context("Failed to reach Vault")?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                bail!("Failed to read Vault secret {key}: HTTP {status} - {error_text}");
            }

            let read: ReadResponse = response
                .json()
                .await
                .context("Failed to parse Vault read response")?;

            let secret = extract_kv_data(kv_version, read.data)
                .with_context(|| format!("Vault secret {key} has no data"))?;

            Ok(SecretValue::Text(secret.to_string()))
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_kv_v2() {
        let data = json!({ "data": { "password": "pw" }, "metadata": { "version": 3 } });
        assert_eq!(
            extract_kv_data(2, Some(data)),
            Some(json!({ "password": "pw" }))
        );
    }

    #[test]
    fn test_extract_kv_v1() {
        let data = json!({ "password": "pw" });
        assert_eq!(extract_kv_data(1, Some(data.clone())), Some(data));
        assert_eq!(extract_kv_data(1, None), None);
    }

    #[test]
    fn test_extract_kv_v2_without_data() {
        assert_eq!(extract_kv_data(2, Some(json!({ "metadata": {} }))), None);
    }

    #[test]
    fn test_url_joins_address_and_path() {
        let backend = VaultBackend::new(VaultSettings {
            address: "http://vault:8200/".to_string(),
            ..VaultSettings::default()
        })
        .unwrap();
        assert_eq!(
            backend.url("/secret/data/app"),
            "http://vault:8200/v1/secret/data/app"
        );
    }

    #[test]
    fn test_token_renewal_threshold() {
        let now = Instant::now();
        let token = CachedToken {
            token: Zeroizing::new("t".to_string()),
            expires_at: Some(now + Duration::from_secs(60)),
        };
        assert!(!token.needs_renewal(now, Duration::from_secs(30)));
        assert!(token.needs_renewal(now, Duration::from_secs(90)));

        let forever = CachedToken {
            token: Zeroizing::new("t".to_string()),
            expires_at: None,
        };
        assert!(!forever.needs_renewal(now, Duration::from_secs(u32::MAX as u64)));
    }
}
