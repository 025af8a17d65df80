//! # AWS Systems Manager Parameter Store Backend

use super::AwsSessionFactory;
use crate::backend::{Backend, SecretValue};
use crate::crd::{KeyOptions, SpecOptions};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_sdk_ssm::error::DisplayErrorContext;
use std::sync::Arc;
use tracing::{debug_span, Instrument};

#[derive(Debug)]
pub struct ParameterStoreBackend {
    session: Arc<AwsSessionFactory>,
}

impl ParameterStoreBackend {
    pub fn new(session: Arc<AwsSessionFactory>) -> Self {
        Self { session }
    }

    async fn client(&self, spec_options: &SpecOptions) -> Result<aws_sdk_ssm::Client> {
        let sdk_config = self.session.sdk_config(spec_options).await?;
        let mut builder = aws_sdk_ssm::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &self.session.ssm_endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Ok(aws_sdk_ssm::Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl Backend for ParameterStoreBackend {
    async fn fetch_value(
        &self,
        key: &str,
        _key_options: &KeyOptions,
        spec_options: &SpecOptions,
    ) -> Result<SecretValue> {
        let span = debug_span!("aws.ssm.get_parameter", parameter.name = key);

        async move {
            let client = self.client(spec_options).await?;
            let output = client
                .get_parameter()
                .name(key)
                .with_decryption(true)
                .send()
                .await
                .map_err(|e| anyhow!("Failed to get SSM parameter {key}: {}", DisplayErrorContext(&e)))?;

            let value = output
                .parameter()
                .and_then(|parameter| parameter.value())
                .with_context(|| format!("SSM parameter {key} has no value"))?;

            Ok(SecretValue::Text(value.to_string()))
        }
        .instrument(span)
        .await
    }
}
