//! # Custom Resource Definitions
//!
//! CRD types for the External Secrets Controller.
//!
//! An `ExternalSecret` declares where secret material lives in an external
//! store and how it maps onto the fields of a Kubernetes `Secret`.

mod options;
mod status;

pub use options::{KeyOptions, SpecOptions};
pub use status::{Condition, ExternalSecretStatus};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::CustomResource;
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};

/// ExternalSecret Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: kubernetes-client.io/v1
/// kind: ExternalSecret
/// metadata:
///   name: hello-service
///   namespace: default
/// spec:
///   backendType: secretsManager
///   roleArn: arn:aws:iam::123456789012:role/test-role
///   dataFrom:
///     - hello-service/credentials
///   data:
///     - key: hello-service/password
///       name: password
///     - key: hello-service/config
///       name: username
///       property: user
/// ```
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "ExternalSecret",
    group = "kubernetes-client.io",
    version = "v1",
    namespaced,
    status = "ExternalSecretStatus",
    shortname = "es",
    printcolumn = r#"{"name":"Last Sync", "type":"date", "jsonPath":".status.lastSync"}, {"name":"Status", "type":"string", "jsonPath":".status.status"}"#
)]
#[serde(rename_all = "camelCase")]
#[schemars(extend("x-kubernetes-preserve-unknown-fields" = true))]
pub struct ExternalSecretSpec {
    /// Backend that holds the secret values
    /// Values: secretsManager, systemManager, vault, azureKeyVault, gcpSecretsManager
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<String>,
    /// Role to assume when talking to the backend
    /// Must be permitted by the namespace role annotation when one is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    /// Individually named values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<DataEntry>>,
    /// Legacy alias of `data`, only read when `data` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<DataEntry>>,
    /// Backend keys holding JSON objects whose top-level fields are merged into the Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_from: Option<Vec<String>>,
    /// Partial Secret manifest merged into the generated Secret (labels, annotations, type)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub template: Option<serde_json::Value>,
    /// Backend specific settings (keyVaultName, projectId, vaultRole, region, ...)
    #[serde(flatten)]
    #[schemars(skip)]
    pub options: SpecOptions,
}

/// One named value in the generated Secret
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[schemars(extend("x-kubernetes-preserve-unknown-fields" = true))]
pub struct DataEntry {
    /// Key of the value in the backend
    #[serde(default)]
    pub key: String,
    /// Field name in the generated Secret
    #[serde(default)]
    pub name: String,
    /// When set, the fetched value is parsed as JSON and this property is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    /// Backend specific per-key settings (versionId, versionStage, isBinary, ...)
    #[serde(flatten)]
    #[schemars(skip)]
    pub options: KeyOptions,
}

impl ExternalSecretSpec {
    /// Entries from `data`, falling back to the legacy `properties` field
    pub fn data_entries(&self) -> &[DataEntry] {
        self.data
            .as_deref()
            .or(self.properties.as_deref())
            .unwrap_or_default()
    }

    pub fn data_from_keys(&self) -> &[String] {
        self.data_from.as_deref().unwrap_or_default()
    }

    /// Everything on the spec other than `data`, `properties` and `dataFrom`
    ///
    /// Backends see `roleArn` and any backend specific fields through this map.
    pub fn spec_options(&self) -> SpecOptions {
        let mut options = self.options.clone();
        if let Some(backend_type) = &self.backend_type {
            options.insert("backendType", backend_type.clone().into());
        }
        if let Some(role_arn) = &self.role_arn {
            options.insert("roleArn", role_arn.clone().into());
        }
        if let Some(template) = &self.template {
            options.insert("template", template.clone());
        }
        options
    }
}

impl ExternalSecret {
    /// Stable identity used to key pollers: the uid, or `namespace/name` when
    /// the object carries no uid
    pub fn identity(&self) -> String {
        identity_of(&self.metadata)
    }

    pub fn name_or_unknown(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("unknown")
    }

    pub fn namespace_or_default(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }
}

/// Poller identity from object metadata alone
pub fn identity_of(metadata: &ObjectMeta) -> String {
    match &metadata.uid {
        Some(uid) => uid.clone(),
        None => format!(
            "{}/{}",
            metadata.namespace.as_deref().unwrap_or("default"),
            metadata.name.as_deref().unwrap_or("unknown")
        ),
    }
}

fn preserve_unknown_fields(_gen: &mut SchemaGenerator) -> Schema {
    schemars::json_schema!({
        "type": "object",
        "nullable": true,
        "x-kubernetes-preserve-unknown-fields": true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spec_decodes_flattened_options() {
        let spec: ExternalSecretSpec = serde_json::from_value(json!({
            "backendType": "vault",
            "vaultRole": "reader",
            "kvVersion": 2,
            "data": [
                { "key": "secret/data/app", "name": "password", "property": "pw", "versionStage": "AWSCURRENT" }
            ]
        }))
        .unwrap();

        assert_eq!(spec.backend_type.as_deref(), Some("vault"));
        assert_eq!(spec.options.get_str("vaultRole").as_deref(), Some("reader"));
        assert_eq!(spec.options.get_u64("kvVersion"), Some(2));

        let entry = &spec.data_entries()[0];
        assert_eq!(entry.property.as_deref(), Some("pw"));
        assert_eq!(entry.options.get_str("versionStage").as_deref(), Some("AWSCURRENT"));
        assert!(entry.options.get("key").is_none());
    }

    #[test]
    fn test_properties_alias_used_when_data_absent() {
        let spec: ExternalSecretSpec = serde_json::from_value(json!({
            "properties": [{ "key": "k1", "name": "a" }]
        }))
        .unwrap();
        assert_eq!(spec.data_entries().len(), 1);
        assert_eq!(spec.data_entries()[0].name, "a");
    }

    #[test]
    fn test_data_wins_over_properties() {
        let spec: ExternalSecretSpec = serde_json::from_value(json!({
            "data": [{ "key": "k2", "name": "b" }],
            "properties": [{ "key": "k1", "name": "a" }]
        }))
        .unwrap();
        assert_eq!(spec.data_entries()[0].key, "k2");
    }

    #[test]
    fn test_spec_options_exclude_data_fields() {
        let spec: ExternalSecretSpec = serde_json::from_value(json!({
            "backendType": "secretsManager",
            "roleArn": "arn:aws:iam::1:role/x",
            "region": "eu-west-1",
            "data": [{ "key": "k1", "name": "a" }],
            "dataFrom": ["blob"]
        }))
        .unwrap();

        let options = spec.spec_options();
        assert_eq!(options.get_str("roleArn").as_deref(), Some("arn:aws:iam::1:role/x"));
        assert_eq!(options.get_str("region").as_deref(), Some("eu-west-1"));
        assert!(options.get("data").is_none());
        assert!(options.get("dataFrom").is_none());
    }

    #[test]
    fn test_identity_falls_back_to_namespaced_name() {
        let mut resource = ExternalSecret::new("foo", ExternalSecretSpec::default());
        resource.metadata.namespace = Some("team-a".to_string());
        assert_eq!(resource.identity(), "team-a/foo");

        resource.metadata.uid = Some("abc-123".to_string());
        assert_eq!(resource.identity(), "abc-123");
    }
}
