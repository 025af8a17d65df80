//! # Backend Options
//!
//! Free-form option maps carried on an `ExternalSecret`.
//!
//! Spec options live on the resource spec (`roleArn`, `keyVaultName`,
//! `vaultRole`, ...); key options live on individual data entries
//! (`versionId`, `versionStage`, `isBinary`, ...). Both accept either native
//! JSON types or their string forms, since manifests are often templated.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

macro_rules! option_map {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(Map<String, Value>);

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn get(&self, key: &str) -> Option<&Value> {
                self.0.get(key)
            }

            pub fn insert(&mut self, key: &str, value: Value) {
                self.0.insert(key.to_string(), value);
            }

            /// String form of a scalar value, ignoring empty strings
            ///
            /// Numbers and booleans are rendered, so an unquoted `version: 1`
            /// reads as `"1"`.
            pub fn get_str(&self, key: &str) -> Option<Cow<'_, str>> {
                match self.0.get(key)? {
                    Value::String(s) if !s.is_empty() => Some(Cow::Borrowed(s.as_str())),
                    Value::Number(n) => Some(Cow::Owned(n.to_string())),
                    Value::Bool(b) => Some(Cow::Owned(b.to_string())),
                    _ => None,
                }
            }

            /// Boolean value; `"true"` counts as true
            pub fn get_bool(&self, key: &str) -> bool {
                match self.0.get(key) {
                    Some(Value::Bool(b)) => *b,
                    Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
                    _ => false,
                }
            }

            pub fn get_u64(&self, key: &str) -> Option<u64> {
                match self.0.get(key)? {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                }
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<Map<String, Value>> for $name {
            fn from(map: Map<String, Value>) -> Self {
                Self(map)
            }
        }
    };
}

option_map!(
    /// Options set on the `ExternalSecret` spec, outside `data`/`dataFrom`
    SpecOptions
);

option_map!(
    /// Options set on a single `data` entry, outside `key`/`name`/`property`
    KeyOptions
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key_options(value: Value) -> KeyOptions {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_get_bool_accepts_strings() {
        assert!(key_options(json!({ "isBinary": true })).get_bool("isBinary"));
        assert!(key_options(json!({ "isBinary": "true" })).get_bool("isBinary"));
        assert!(key_options(json!({ "isBinary": "TRUE" })).get_bool("isBinary"));
        assert!(!key_options(json!({ "isBinary": "no" })).get_bool("isBinary"));
        assert!(!key_options(json!({})).get_bool("isBinary"));
    }

    #[test]
    fn test_get_u64_accepts_strings() {
        let options = key_options(json!({ "a": 2, "b": "1", "c": "x" }));
        assert_eq!(options.get_u64("a"), Some(2));
        assert_eq!(options.get_u64("b"), Some(1));
        assert_eq!(options.get_u64("c"), None);
    }

    #[test]
    fn test_get_str_ignores_empty() {
        let options = key_options(json!({ "versionStage": "", "versionId": "v1" }));
        assert_eq!(options.get_str("versionStage"), None);
        assert_eq!(options.get_str("versionId").as_deref(), Some("v1"));
    }

    #[test]
    fn test_get_str_renders_numbers_and_bools() {
        let options = key_options(json!({ "version": 1, "flag": false, "nested": { "a": 1 }, "none": null }));
        assert_eq!(options.get_str("version").as_deref(), Some("1"));
        assert_eq!(options.get_str("flag").as_deref(), Some("false"));
        assert_eq!(options.get_str("nested"), None);
        assert_eq!(options.get_str("none"), None);

        let spec_options: SpecOptions = serde_json::from_value(json!({ "projectId": 111_122_223_333_u64 })).unwrap();
        assert_eq!(spec_options.get_str("projectId").as_deref(), Some("111122223333"));
    }
}
