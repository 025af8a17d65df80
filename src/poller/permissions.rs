//! # Namespace Permission Policy
//!
//! Namespaces restrict what their ExternalSecrets may do through two
//! annotations holding regular expressions:
//!
//! - the role annotation limits the `roleArn` that may be assumed
//! - the naming annotation limits which backend keys may be read
//!
//! Patterns must match the whole value.

use crate::config::ControllerConfig;
use crate::crd::ExternalSecretSpec;
use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct PermissionDenied {
    pub reason: String,
}

impl PermissionDenied {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PermissionPolicy {
    pub role_annotation: String,
    pub naming_annotation: String,
    /// Deny `roleArn` in namespaces without a role annotation
    pub enforce_namespace_annotation: bool,
}

impl PermissionPolicy {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            role_annotation: config.role_permitted_annotation.clone(),
            naming_annotation: config.naming_permitted_annotation.clone(),
            enforce_namespace_annotation: config.enforce_namespace_annotation,
        }
    }

    /// Decide whether `spec` may be synced in a namespace with `annotations`
    pub fn check(
        &self,
        spec: &ExternalSecretSpec,
        annotations: &BTreeMap<String, String>,
    ) -> Result<(), PermissionDenied> {
        if let Some(pattern) = annotations.get(&self.naming_annotation) {
            let naming = compile(pattern)?;
            let keys = spec
                .data_entries()
                .iter()
                .map(|entry| entry.key.as_str())
                .chain(spec.data_from_keys().iter().map(String::as_str));
            for key in keys {
                if !naming.is_match(key) {
                    return Err(PermissionDenied::new(format!(
                        "key name {key} does not match naming convention {pattern}"
                    )));
                }
            }
        }

        let Some(role) = spec.role_arn.as_deref().filter(|role| !role.is_empty()) else {
            return Ok(());
        };

        match annotations.get(&self.role_annotation) {
            Some(pattern) if compile(pattern)?.is_match(role) => Ok(()),
            Some(pattern) => Err(PermissionDenied::new(format!(
                "namespace does not allow to assume role {role}, allowed pattern is {pattern}"
            ))),
            None if self.enforce_namespace_annotation => Err(PermissionDenied::new(format!(
                "namespace does not allow to assume role {role}, annotation {} is not set",
                self.role_annotation
            ))),
            None => Ok(()),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, PermissionDenied> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| PermissionDenied::new(format!("invalid permission pattern {pattern}: {e}")))
}
