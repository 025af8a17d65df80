//! # Backend Settings
//!
//! Process-wide defaults for the concrete secret backends.

use super::{env_var_opt, env_var_or_default};
use crate::constants::{DEFAULT_AWS_REGION, DEFAULT_VAULT_ADDR, DEFAULT_VAULT_MOUNT_POINT};

/// Settings for every backend, read once at startup
#[derive(Debug, Clone, Default)]
pub struct BackendSettings {
    pub aws: AwsSettings,
    pub vault: VaultSettings,
    pub gcp: GcpSettings,
    /// Overrides the Azure Key Vault URL (local testing only)
    pub azure_key_vault_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AwsSettings {
    pub region: String,
    /// Overrides the Secrets Manager endpoint (localstack and similar)
    pub secrets_manager_endpoint: Option<String>,
    /// Overrides the SSM endpoint (localstack and similar)
    pub ssm_endpoint: Option<String>,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_AWS_REGION.to_string(),
            secrets_manager_endpoint: None,
            ssm_endpoint: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VaultSettings {
    pub address: String,
    /// Sent as X-Vault-Namespace when set
    pub namespace: Option<String>,
    pub default_mount_point: String,
    pub default_role: Option<String>,
    /// Log in again once a token has less than this many seconds left
    pub token_renew_threshold_secs: u64,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            address: DEFAULT_VAULT_ADDR.to_string(),
            namespace: None,
            default_mount_point: DEFAULT_VAULT_MOUNT_POINT.to_string(),
            default_role: None,
            token_renew_threshold_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GcpSettings {
    pub default_project_id: Option<String>,
    /// Overrides the Secret Manager endpoint (local testing only)
    pub secret_manager_endpoint: Option<String>,
}

impl BackendSettings {
    /// Load backend settings from the environment
    ///
    /// The Vault renew threshold defaults to three poll intervals so a token is
    /// refreshed while at least one poll remains to retry a failed login.
    pub fn from_env() -> Self {
        let poller_interval_secs = env_var_or_default(
            "POLLER_INTERVAL_MILLISECONDS",
            crate::constants::DEFAULT_POLLER_INTERVAL_MS,
        ) / 1000;

        Self {
            aws: AwsSettings {
                region: env_var_or_default("AWS_REGION", DEFAULT_AWS_REGION.to_string()),
                secrets_manager_endpoint: env_var_opt("AWS_SECRETS_MANAGER_ENDPOINT"),
                ssm_endpoint: env_var_opt("AWS_SSM_ENDPOINT"),
            },
            vault: VaultSettings {
                address: env_var_or_default("VAULT_ADDR", DEFAULT_VAULT_ADDR.to_string()),
                namespace: env_var_opt("VAULT_NAMESPACE"),
                default_mount_point: env_var_or_default(
                    "DEFAULT_VAULT_MOUNT_POINT",
                    DEFAULT_VAULT_MOUNT_POINT.to_string(),
                ),
                default_role: env_var_opt("DEFAULT_VAULT_ROLE"),
                token_renew_threshold_secs: env_var_or_default(
                    "VAULT_TOKEN_RENEW_THRESHOLD",
                    (3 * poller_interval_secs).max(1),
                ),
            },
            gcp: GcpSettings {
                default_project_id: env_var_opt("GCP_PROJECT_ID"),
                secret_manager_endpoint: env_var_opt("GCP_SECRET_MANAGER_ENDPOINT"),
            },
            azure_key_vault_endpoint: env_var_opt("AZURE_KEY_VAULT_ENDPOINT"),
        }
    }
}
