//! # Constants
//!
//! Default values shared by the configuration layer and the runtime.

/// Default interval between two syncs of the same ExternalSecret (milliseconds)
pub const DEFAULT_POLLER_INTERVAL_MS: u64 = 10_000;

/// Namespace annotation holding the pattern of roles that may be assumed
pub const DEFAULT_ROLE_PERMITTED_ANNOTATION: &str = "iam.amazonaws.com/permitted";

/// Namespace annotation holding the pattern backend keys must match
pub const DEFAULT_NAMING_PERMITTED_ANNOTATION: &str =
    "externalsecrets.kubernetes-client.io/permitted-key-name";

/// Initial delay before reopening a dropped watch stream (milliseconds)
pub const DEFAULT_WATCH_RECONNECT_MIN_BACKOFF_MS: u64 = 250;

/// Upper bound for the watch reconnect delay (milliseconds)
pub const DEFAULT_WATCH_RECONNECT_MAX_BACKOFF_MS: u64 = 30_000;

/// Default port for metrics and probes
pub const DEFAULT_METRICS_PORT: u16 = 3001;

/// Server startup timeout (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Server readiness poll interval (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Region used by the AWS backends when neither the spec nor the environment sets one
pub const DEFAULT_AWS_REGION: &str = "us-west-2";

/// Vault address used when VAULT_ADDR is unset
pub const DEFAULT_VAULT_ADDR: &str = "http://127.0.0.1:8200";

/// Vault Kubernetes auth mount point used when the spec does not set `vaultMountPoint`
pub const DEFAULT_VAULT_MOUNT_POINT: &str = "kubernetes";

/// Service account token presented to Vault's Kubernetes auth method
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Field manager used for server-side apply of generated Secrets and status
pub const FIELD_MANAGER: &str = "external-secrets-controller";

/// Log filter used when RUST_LOG is unset
pub const DEFAULT_LOG_FILTER: &str = "external_secrets_controller=info";
