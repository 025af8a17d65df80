//! # AWS Secrets Manager Backend
//!
//! Reads `SecretString` or `SecretBinary`. Data entries may pin a
//! `versionId` or `versionStage`.

use super::AwsSessionFactory;
use crate::backend::{Backend, SecretValue};
use crate::crd::{KeyOptions, SpecOptions};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug_span, Instrument};

#[derive(Debug)]
pub struct SecretsManagerBackend {
    session: Arc<AwsSessionFactory>,
}

impl SecretsManagerBackend {
    pub fn new(session: Arc<AwsSessionFactory>) -> Self {
        Self { session }
    }

    async fn client(&self, spec_options: &SpecOptions) -> Result<aws_sdk_secretsmanager::Client> {
        let sdk_config = self.session.sdk_config(spec_options).await?;
        let mut builder = aws_sdk_secretsmanager::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &self.session.secrets_manager_endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Ok(aws_sdk_secretsmanager::Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl Backend for SecretsManagerBackend {
    async fn fetch_value(
        &self,
        key: &str,
        key_options: &KeyOptions,
        spec_options: &SpecOptions,
    ) -> Result<SecretValue> {
        let span = debug_span!("aws.secretsmanager.get", secret.name = key);

        async move {
            let client = self.client(spec_options).await?;
            let output = client
                .get_secret_value()
                .secret_id(key)
                .set_version_id(key_options.get_str("versionId").map(Cow::into_owned))
                .set_version_stage(key_options.get_str("versionStage").map(Cow::into_owned))
                .send()
                .await
                .map_err(|e| anyhow!("Failed to get AWS secret {key}: {}", DisplayErrorContext(&e)))?;

            if let Some(text) = output.secret_string() {
                return Ok(SecretValue::Text(text.to_string()));
            }
            if let Some(blob) = output.secret_binary() {
                return Ok(SecretValue::Binary(blob.as_ref().to_vec()));
            }
            bail!("AWS secret {key} has neither SecretString nor SecretBinary")
        }
        .instrument(span)
        .await
    }
}
