//! Watch event records and line parsing.

use crate::crd::{identity_of, ExternalSecret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// One event delivered to the daemon
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Added(Box<ExternalSecret>),
    Modified(Box<ExternalSecret>),
    Deleted(Box<ExternalSecret>),
    /// Emitted after the watch connection was lost; every known resource must be forgotten
    DeletedAll,
    /// `MODIFIED` or `DELETED` whose object no longer decodes; carries the
    /// identity read from its metadata so the stale poller can be stopped
    Superseded(String),
    /// `ERROR` record from the API server, carrying its status object
    Error(Value),
    /// Any other event type
    Unknown(String),
}

impl WatchEvent {
    pub fn type_name(&self) -> &str {
        match self {
            WatchEvent::Added(_) => "ADDED",
            WatchEvent::Modified(_) => "MODIFIED",
            WatchEvent::Deleted(_) => "DELETED",
            WatchEvent::DeletedAll => "DELETED_ALL",
            WatchEvent::Superseded(_) => "SUPERSEDED",
            WatchEvent::Error(_) => "ERROR",
            WatchEvent::Unknown(event_type) => event_type,
        }
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("invalid watch event line: {0}")]
    InvalidLine(#[from] serde_json::Error),
    #[error("watch event line has no type")]
    MissingType,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: Option<String>,
    #[serde(default)]
    object: Option<Value>,
}

/// Parse one line of the watch stream
///
/// Blank lines yield `Ok(None)`. A lifecycle event whose object is not a
/// decodable ExternalSecret is logged; for `MODIFIED` and `DELETED` with
/// readable metadata it becomes [`WatchEvent::Superseded`], otherwise it is
/// skipped. A line that is not a JSON event record is an error and means the
/// connection can no longer be trusted.
pub fn parse_event_line(line: &str) -> Result<Option<WatchEvent>, WatchError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let raw: RawEvent = serde_json::from_str(line)?;
    let event_type = raw.event_type.ok_or(WatchError::MissingType)?;

    let wrap: fn(Box<ExternalSecret>) -> WatchEvent = match event_type.as_str() {
        "ADDED" => WatchEvent::Added,
        "MODIFIED" => WatchEvent::Modified,
        "DELETED" => WatchEvent::Deleted,
        "ERROR" => return Ok(Some(WatchEvent::Error(raw.object.unwrap_or(Value::Null)))),
        _ => return Ok(Some(WatchEvent::Unknown(event_type))),
    };

    let Some(object) = raw.object else {
        warn!("{} event without object, skipping", event_type);
        return Ok(None);
    };

    let metadata = object.get("metadata").cloned();
    match serde_json::from_value::<ExternalSecret>(object) {
        Ok(resource) => Ok(Some(wrap(Box::new(resource)))),
        Err(e) => {
            warn!("{} event with undecodable ExternalSecret: {}", event_type, e);
            if event_type == "ADDED" {
                return Ok(None);
            }
            Ok(metadata
                .and_then(|metadata| serde_json::from_value::<ObjectMeta>(metadata).ok())
                .map(|metadata| WatchEvent::Superseded(identity_of(&metadata))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDED: &str = r#"{"type":"ADDED","object":{"apiVersion":"kubernetes-client.io/v1","kind":"ExternalSecret","metadata":{"name":"hello","namespace":"default","uid":"u-1"},"spec":{"backendType":"secretsManager","data":[{"key":"k1","name":"a"}]}}}"#;

    #[test]
    fn test_parse_added() {
        let event = parse_event_line(ADDED).unwrap().unwrap();
        let WatchEvent::Added(resource) = event else {
            panic!("expected ADDED, got {event:?}");
        };
        assert_eq!(resource.identity(), "u-1");
        assert_eq!(resource.spec.backend_type.as_deref(), Some("secretsManager"));
    }

    #[test]
    fn test_blank_line_is_skipped() {
        assert!(parse_event_line("   ").unwrap().is_none());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            parse_event_line("{not json"),
            Err(WatchError::InvalidLine(_))
        ));
        assert!(matches!(
            parse_event_line(r#"{"object":{}}"#),
            Err(WatchError::MissingType)
        ));
    }

    #[test]
    fn test_undecodable_object_is_skipped() {
        let line = r#"{"type":"MODIFIED","object":{"metadata":"oops"}}"#;
        assert!(parse_event_line(line).unwrap().is_none());
    }

    #[test]
    fn test_undecodable_modified_supersedes_by_uid() {
        let line = r#"{"type":"MODIFIED","object":{"metadata":{"name":"hello","namespace":"default","uid":"u-9"},"spec":{"data":"not-a-list"}}}"#;
        let event = parse_event_line(line).unwrap().unwrap();
        assert!(matches!(event, WatchEvent::Superseded(ref id) if id == "u-9"));

        let line = r#"{"type":"DELETED","object":{"metadata":{"name":"hello","namespace":"team-a"},"spec":{"data":7}}}"#;
        let event = parse_event_line(line).unwrap().unwrap();
        assert!(matches!(event, WatchEvent::Superseded(ref id) if id == "team-a/hello"));
    }

    #[test]
    fn test_undecodable_added_is_skipped() {
        let line = r#"{"type":"ADDED","object":{"metadata":{"uid":"u-9"},"spec":{"data":"not-a-list"}}}"#;
        assert!(parse_event_line(line).unwrap().is_none());
    }

    #[test]
    fn test_error_and_unknown_events() {
        let error = parse_event_line(r#"{"type":"ERROR","object":{"code":410}}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(error, WatchEvent::Error(ref status) if status["code"] == 410));

        let unknown = parse_event_line(r#"{"type":"BOOKMARK","object":{}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(unknown.type_name(), "BOOKMARK");
    }
}
