//! # GCP Secret Manager Backend
//!
//! Accesses secret versions through the Secret Manager REST API. Access
//! tokens come from the GCE metadata server, which serves Workload Identity
//! tokens on GKE.
//!
//! Spec options:
//! - `projectId`: project holding the secrets (default from `GCP_PROJECT_ID`)
//!
//! Key options:
//! - `version`: secret version (default `latest`)
//! - `isBinary`: keep the payload as raw bytes

use crate::backend::{Backend, SecretValue};
use crate::config::GcpSettings;
use crate::crd::{KeyOptions, SpecOptions};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use std::borrow::Cow;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, debug_span, Instrument};
use zeroize::Zeroizing;

const DEFAULT_SECRET_MANAGER_ENDPOINT: &str = "https://secretmanager.googleapis.com";
const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: VersionPayload,
}

#[derive(Debug, Deserialize)]
struct VersionPayload {
    data: String,
}

struct CachedToken {
    token: Zeroizing<String>,
    expires_at: Instant,
}

pub struct GcpSecretManagerBackend {
    http: ReqwestClient,
    endpoint: String,
    metadata_host: String,
    default_project_id: Option<String>,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for GcpSecretManagerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpSecretManagerBackend")
            .field("endpoint", &self.endpoint)
            .field("default_project_id", &self.default_project_id)
            .finish_non_exhaustive()
    }
}

impl GcpSecretManagerBackend {
    pub fn new(settings: GcpSettings) -> Result<Self> {
        let http = ReqwestClient::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            endpoint: settings
                .secret_manager_endpoint
                .unwrap_or_else(|| DEFAULT_SECRET_MANAGER_ENDPOINT.to_string()),
            metadata_host: std::env::var("GCE_METADATA_HOST")
                .unwrap_or_else(|_| DEFAULT_METADATA_HOST.to_string()),
            default_project_id: settings.default_project_id,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<Zeroizing<String>> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.token.clone());
            }
        }

        debug!("Fetching GCP access token from metadata server");
        let url = format!(
            "http://{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.metadata_host
        );
        let response = self
            .http
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context("Failed to reach GCP metadata server")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("Failed to get GCP access token: HTTP {status} - {error_text}");
        }

        let metadata_token: MetadataToken = response
            .json()
            .await
            .context("Failed to parse GCP access token response")?;

        let token = Zeroizing::new(metadata_token.access_token);
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + Duration::from_secs(metadata_token.expires_in),
        });

        Ok(token)
    }

    /// `projectId` from the spec or the env default, `version` defaulting to `latest`
    fn project_and_version<'a>(
        &'a self,
        key_options: &'a KeyOptions,
        spec_options: &'a SpecOptions,
    ) -> Result<(Cow<'a, str>, Cow<'a, str>)> {
        let project_id = spec_options
            .get_str("projectId")
            .or_else(|| self.default_project_id.as_deref().map(Cow::Borrowed))
            .ok_or_else(|| anyhow!("spec.projectId is not set and GCP_PROJECT_ID is empty"))?;
        let version = key_options.get_str("version").unwrap_or(Cow::Borrowed("latest"));
        Ok((project_id, version))
    }

    fn version_url(&self, project_id: &str, key: &str, version: &str) -> String {
        format!(
            "{}/v1/projects/{}/secrets/{}/versions/{}:access",
            self.endpoint.trim_end_matches('/'),
            project_id,
            key,
            version
        )
    }
}

fn decode_payload(data: &str, is_binary: bool) -> Result<SecretValue> {
    let bytes = BASE64
        .decode(data)
        .context("GCP secret payload is not valid base64")?;
    if is_binary {
        return Ok(SecretValue::Binary(bytes));
    }
    Ok(match String::from_utf8(bytes) {
        Ok(text) => SecretValue::Text(text),
        Err(e) => SecretValue::Binary(e.into_bytes()),
    })
}

#[async_trait]
impl Backend for GcpSecretManagerBackend {
    async fn fetch_value(
        &self,
        key: &str,
        key_options: &KeyOptions,
        spec_options: &SpecOptions,
    ) -> Result<SecretValue> {
        let (project_id, version) = self.project_and_version(key_options, spec_options)?;
        let span = debug_span!("gcp.secretmanager.access", secret.name = key, project.id = &*project_id);

        async move {
            let token = self.access_token().await?;
            let response = self
                .http
                .get(self.version_url(&project_id, key, &version))
                .header("Authorization", format!("Bearer {}", token.as_str()))
                .send()
                .await
                .context("Failed to reach GCP Secret Manager")?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                bail!("Failed to access GCP secret {key}: HTTP {status} - {error_text}");
            }

            let access: AccessSecretVersionResponse = response
                .json()
                .await
                .context("Failed to parse GCP Secret Manager response")?;

            decode_payload(&access.payload.data, key_options.get_bool("isBinary"))
        }
        .instrument(span)
        .await
    }
}
