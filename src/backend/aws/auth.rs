//! # AWS Authentication
//!
//! Builds SDK configuration for a sync. Without `roleArn` the default
//! credential chain (IRSA, instance profile, environment) is used; with one,
//! temporary credentials are obtained through STS and cached per role until
//! shortly before they expire.

use crate::config::AwsSettings;
use crate::crd::SpecOptions;
use anyhow::{anyhow, Context, Result};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_sts::error::DisplayErrorContext;
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Assumed-role credentials are refreshed this long before they expire
const CREDENTIAL_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedCredentials {
    credentials: Credentials,
    expires_at: Option<SystemTime>,
}

impl CachedCredentials {
    fn is_fresh(&self, now: SystemTime) -> bool {
        match self.expires_at {
            Some(expires_at) => now + CREDENTIAL_REFRESH_MARGIN < expires_at,
            None => true,
        }
    }
}

/// Shared AWS credential source
#[derive(Debug)]
pub struct AwsSessionFactory {
    base_config: SdkConfig,
    pub(super) secrets_manager_endpoint: Option<String>,
    pub(super) ssm_endpoint: Option<String>,
    assumed: Mutex<HashMap<String, CachedCredentials>>,
}

impl AwsSessionFactory {
    pub async fn from_settings(settings: &AwsSettings) -> Self {
        let base_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .load()
            .await;

        if let Some(endpoint) = &settings.secrets_manager_endpoint {
            info!("Routing AWS Secrets Manager requests to {}", endpoint);
        }
        if let Some(endpoint) = &settings.ssm_endpoint {
            info!("Routing AWS SSM requests to {}", endpoint);
        }

        Self {
            base_config,
            secrets_manager_endpoint: settings.secrets_manager_endpoint.clone(),
            ssm_endpoint: settings.ssm_endpoint.clone(),
            assumed: Mutex::new(HashMap::new()),
        }
    }

    /// SDK config for one sync, honouring `region` and `roleArn` from the spec
    pub async fn sdk_config(&self, spec_options: &SpecOptions) -> Result<SdkConfig> {
        let region = spec_options.get_str("region");
        let role_arn = spec_options.get_str("roleArn");

        if region.is_none() && role_arn.is_none() {
            return Ok(self.base_config.clone());
        }

        let mut builder = self.base_config.to_builder();
        if let Some(region) = region {
            builder = builder.region(Region::new(region.into_owned()));
        }
        if let Some(role_arn) = role_arn {
            let credentials = self.assume_role(&role_arn).await?;
            builder = builder.credentials_provider(SharedCredentialsProvider::new(credentials));
        }
        Ok(builder.build())
    }

    async fn assume_role(&self, role_arn: &str) -> Result<Credentials> {
        let mut assumed = self.assumed.lock().await;

        if let Some(cached) = assumed.get(role_arn) {
            if cached.is_fresh(SystemTime::now()) {
                return Ok(cached.credentials.clone());
            }
        }

        debug!("Assuming role {}", role_arn);
        let session_name = format!("external-secrets-{}", uuid::Uuid::new_v4().simple());
        let output = aws_sdk_sts::Client::new(&self.base_config)
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to assume role {role_arn}: {}", DisplayErrorContext(&e)))?;

        let sts_credentials = output
            .credentials()
            .with_context(|| format!("STS returned no credentials for role {role_arn}"))?;

        let expires_at = u64::try_from(sts_credentials.expiration().secs())
            .ok()
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs));

        let credentials = Credentials::new(
            sts_credentials.access_key_id(),
            sts_credentials.secret_access_key(),
            Some(sts_credentials.session_token().to_string()),
            expires_at,
            "external-secrets-assume-role",
        );

        assumed.insert(
            role_arn.to_string(),
            CachedCredentials {
                credentials: credentials.clone(),
                expires_at,
            },
        );

        Ok(credentials)
    }
}
