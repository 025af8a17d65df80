//! # Azure Authentication
//!
//! Workload Identity when the federated token is mounted into the pod,
//! Managed Identity otherwise.

use anyhow::{Context, Result};
use azure_core::credentials::TokenCredential;
use azure_identity::{ManagedIdentityCredential, WorkloadIdentityCredential};
use std::sync::Arc;
use tracing::info;

pub fn create_credential() -> Result<Arc<dyn TokenCredential>> {
    let credential: Arc<dyn TokenCredential> = if std::env::var("AZURE_FEDERATED_TOKEN_FILE").is_ok() {
        let client_id = std::env::var("AZURE_CLIENT_ID").ok();
        info!(
            "Using Azure Workload Identity authentication with client ID: {}",
            client_id.as_deref().unwrap_or("<from environment>")
        );
        let options = azure_identity::WorkloadIdentityCredentialOptions {
            client_id,
            ..Default::default()
        };
        WorkloadIdentityCredential::new(Some(options))
            .context("Failed to create WorkloadIdentityCredential")?
    } else {
        info!("No federated token found, using Azure Managed Identity");
        ManagedIdentityCredential::new(None).context("Failed to create ManagedIdentityCredential")?
    };

    Ok(credential)
}
