//! # Secret Materialization
//!
//! Backend-agnostic conversion of an ExternalSecret spec into Secret `data`.
//!
//! `dataFrom` keys are fetched and parsed as JSON objects whose top-level
//! fields are merged first; `data` entries are merged afterwards so they win
//! on name collisions. Every value is then encoded to bytes and base64, the
//! format Kubernetes expects in `Secret.data`.

use super::{Backend, SecretValue};
use crate::crd::{DataEntry, ExternalSecretSpec, KeyOptions, SpecOptions};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::future::try_join_all;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Secret field name to base64-encoded content
pub type SecretPayload = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("Failed to fetch {key}: {source:#}")]
    Fetch {
        key: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Could not find property {property} in {key}")]
    MissingProperty { property: String, key: String },
    #[error("data[{index}] is missing required field '{field}'")]
    InvalidEntry { index: usize, field: &'static str },
}

/// Value after JSON parsing / property selection, before encoding
#[derive(Debug, Clone, PartialEq)]
enum PlainValue {
    Bytes(Vec<u8>),
    Json(Value),
}

impl From<SecretValue> for PlainValue {
    fn from(value: SecretValue) -> Self {
        match value {
            SecretValue::Text(text) => PlainValue::Json(Value::String(text)),
            SecretValue::Binary(bytes) => PlainValue::Bytes(bytes),
        }
    }
}

impl PlainValue {
    /// Binary passes through, strings are used verbatim, anything else is JSON text
    fn into_bytes(self) -> Vec<u8> {
        match self {
            PlainValue::Bytes(bytes) => bytes,
            PlainValue::Json(Value::String(text)) => text.into_bytes(),
            PlainValue::Json(Value::Number(number)) => render_number(&number).into_bytes(),
            PlainValue::Json(other) => other.to_string().into_bytes(),
        }
    }
}

/// Integral floats render without a fraction (`1.0` becomes `1`)
fn render_number(number: &serde_json::Number) -> String {
    match number.as_f64() {
        Some(float) if number.is_f64() && float.fract() == 0.0 && float.abs() < 1e21 => {
            if float == 0.0 {
                "0".to_string()
            } else {
                format!("{float}")
            }
        }
        _ => number.to_string(),
    }
}

/// Base64 encode a raw backend value the way it would appear in `Secret.data`
pub fn encode_value(value: SecretValue) -> String {
    BASE64.encode(PlainValue::from(value).into_bytes())
}

fn parse_json(value: &SecretValue) -> Option<Value> {
    match value {
        SecretValue::Text(text) => serde_json::from_str(text).ok(),
        SecretValue::Binary(bytes) => serde_json::from_slice(bytes).ok(),
    }
}

async fn fetch<B: Backend + ?Sized>(
    backend: &B,
    key: &str,
    key_options: &KeyOptions,
    spec_options: &SpecOptions,
) -> Result<SecretValue, MaterializeError> {
    backend
        .fetch_value(key, key_options, spec_options)
        .await
        .map_err(|source| MaterializeError::Fetch {
            key: key.to_string(),
            source,
        })
}

async fn fetch_data_from<B: Backend + ?Sized>(
    backend: &B,
    key: &str,
    spec_options: &SpecOptions,
) -> Result<Vec<(String, PlainValue)>, MaterializeError> {
    let value = fetch(backend, key, &KeyOptions::default(), spec_options).await?;

    match parse_json(&value) {
        Some(Value::Object(fields)) => Ok(fields
            .into_iter()
            .map(|(name, value)| (name, PlainValue::Json(value)))
            .collect()),
        _ => {
            warn!(
                "Failed to JSON.parse value for '{}', please verify that your secret value is correctly formatted as a JSON object.",
                key
            );
            Ok(Vec::new())
        }
    }
}

async fn fetch_data_entry<B: Backend + ?Sized>(
    backend: &B,
    index: usize,
    entry: &DataEntry,
    spec_options: &SpecOptions,
) -> Result<Option<(String, PlainValue)>, MaterializeError> {
    if entry.key.is_empty() {
        return Err(MaterializeError::InvalidEntry { index, field: "key" });
    }
    if entry.name.is_empty() {
        return Err(MaterializeError::InvalidEntry { index, field: "name" });
    }

    let value = fetch(backend, &entry.key, &entry.options, spec_options).await?;

    let Some(property) = &entry.property else {
        return Ok(Some((entry.name.clone(), value.into())));
    };

    let Some(parsed) = parse_json(&value) else {
        warn!(
            "Failed to JSON.parse value for '{}', please verify that your secret value is correctly formatted as JSON. To use plain text secret remove the 'property: {}'",
            entry.key, property
        );
        return Ok(None);
    };

    match parsed.get(property.as_str()) {
        Some(selected) => Ok(Some((entry.name.clone(), PlainValue::Json(selected.clone())))),
        None => Err(MaterializeError::MissingProperty {
            property: property.clone(),
            key: entry.key.clone(),
        }),
    }
}

/// Fetch every value declared by `spec` from `backend` and encode the result
///
/// Fetches run concurrently; the merge order is fixed regardless of which
/// fetch completes first.
pub async fn materialize<B: Backend + ?Sized>(
    backend: &B,
    spec: &ExternalSecretSpec,
) -> Result<SecretPayload, MaterializeError> {
    let spec_options = spec.spec_options();

    let data_from = try_join_all(
        spec.data_from_keys()
            .iter()
            .map(|key| fetch_data_from(backend, key, &spec_options)),
    );
    let data = try_join_all(
        spec.data_entries()
            .iter()
            .enumerate()
            .map(|(index, entry)| fetch_data_entry(backend, index, entry, &spec_options)),
    );

    let (data_from_values, data_values) = futures::try_join!(data_from, data)?;

    let mut plain_values = BTreeMap::new();
    for (name, value) in data_from_values
        .into_iter()
        .flatten()
        .chain(data_values.into_iter().flatten())
    {
        plain_values.insert(name, value);
    }

    debug!("Materialized {} secret fields", plain_values.len());

    Ok(plain_values
        .into_iter()
        .map(|(name, value)| (name, BASE64.encode(value.into_bytes())))
        .collect())
}
