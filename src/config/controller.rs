//! # Sync Configuration
//!
//! Polling, permission-policy and watch settings.

use super::env_var_or_default;
use std::time::Duration;

/// Controller configuration shared by the daemon, the poller factory and the watch stream
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Interval between two syncs of one ExternalSecret
    pub poller_interval: Duration,
    /// When true, pollers register but never fetch
    pub polling_disabled: bool,
    /// Namespace annotation listing the roles that may be assumed
    pub role_permitted_annotation: String,
    /// Namespace annotation listing the backend keys that may be read
    pub naming_permitted_annotation: String,
    /// Deny role assumption in namespaces without a role annotation
    pub enforce_namespace_annotation: bool,
    /// First delay before reopening a dropped watch stream; zero reconnects immediately
    pub watch_reconnect_min_backoff: Duration,
    /// Cap for the exponential watch reconnect delay
    pub watch_reconnect_max_backoff: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            poller_interval: Duration::from_millis(DEFAULT_POLLER_INTERVAL_MS),
            polling_disabled: false,
            role_permitted_annotation: DEFAULT_ROLE_PERMITTED_ANNOTATION.to_string(),
            naming_permitted_annotation: DEFAULT_NAMING_PERMITTED_ANNOTATION.to_string(),
            enforce_namespace_annotation: false,
            watch_reconnect_min_backoff: Duration::from_millis(
                DEFAULT_WATCH_RECONNECT_MIN_BACKOFF_MS,
            ),
            watch_reconnect_max_backoff: Duration::from_millis(
                DEFAULT_WATCH_RECONNECT_MAX_BACKOFF_MS,
            ),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        let min_backoff_ms = env_var_or_default(
            "WATCH_RECONNECT_MIN_BACKOFF_MS",
            DEFAULT_WATCH_RECONNECT_MIN_BACKOFF_MS,
        );
        let max_backoff_ms = env_var_or_default(
            "WATCH_RECONNECT_MAX_BACKOFF_MS",
            DEFAULT_WATCH_RECONNECT_MAX_BACKOFF_MS,
        )
        .max(min_backoff_ms);

        Self {
            poller_interval: Duration::from_millis(
                env_var_or_default("POLLER_INTERVAL_MILLISECONDS", DEFAULT_POLLER_INTERVAL_MS)
                    .max(1),
            ),
            polling_disabled: env_var_or_default("DISABLE_POLLING", false),
            role_permitted_annotation: env_var_or_default(
                "ROLE_PERMITTED_ANNOTATION",
                DEFAULT_ROLE_PERMITTED_ANNOTATION.to_string(),
            ),
            naming_permitted_annotation: env_var_or_default(
                "NAMING_PERMITTED_ANNOTATION",
                DEFAULT_NAMING_PERMITTED_ANNOTATION.to_string(),
            ),
            enforce_namespace_annotation: env_var_or_default(
                "ENFORCE_NAMESPACE_ANNOTATIONS",
                false,
            ),
            watch_reconnect_min_backoff: Duration::from_millis(min_backoff_ms),
            watch_reconnect_max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.poller_interval, Duration::from_secs(10));
        assert!(!config.polling_disabled);
        assert!(!config.enforce_namespace_annotation);
        assert_eq!(config.role_permitted_annotation, "iam.amazonaws.com/permitted");
        assert!(config.watch_reconnect_min_backoff <= config.watch_reconnect_max_backoff);
    }
}
