//! Generated Secret manifests.

use crate::backend::SecretPayload;
use crate::crd::ExternalSecret;
use k8s_openapi::api::core::v1::Secret;
use kube::Resource;
use serde_json::{json, Map, Value};

/// Build the Secret owned by `resource` holding `payload`
///
/// `spec.template` is deep-merged first; name, namespace, owner reference
/// and generated data always win over it. `type` defaults to `Opaque`.
pub fn build_secret_manifest(
    resource: &ExternalSecret,
    payload: &SecretPayload,
) -> Result<Secret, serde_json::Error> {
    let mut manifest = json!({
        "apiVersion": "v1",
        "kind": "Secret",
    });

    if let Some(template) = &resource.spec.template {
        merge(&mut manifest, template);
    }

    let mut overlay = json!({
        "metadata": {
            "name": resource.name_or_unknown(),
            "namespace": resource.namespace_or_default(),
        },
        "data": payload,
    });
    if let Some(owner) = resource.controller_owner_ref(&()) {
        overlay["metadata"]["ownerReferences"] = json!([owner]);
    }
    merge(&mut manifest, &overlay);

    if let Value::Object(fields) = &mut manifest {
        fields
            .entry("type")
            .or_insert_with(|| Value::String("Opaque".to_string()));
        // Applied as a whole, these are owned by the controller
        fields.insert("apiVersion".to_string(), json!("v1"));
        fields.insert("kind".to_string(), json!("Secret"));
    }

    serde_json::from_value(manifest)
}

/// Recursively merge `patch` into `base`; objects merge, everything else replaces
fn merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_fields), Value::Object(patch_fields)) => {
            for (key, value) in patch_fields {
                merge(
                    base_fields.entry(key.clone()).or_insert(Value::Object(Map::new())),
                    value,
                );
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}
