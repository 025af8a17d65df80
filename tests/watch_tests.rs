//! # Watch Stream Integration Tests
//!
//! Scripted watch connections verify the reconnect-and-rebuild cycle.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use external_secrets_controller::watch::{
    ExternalSecretEvents, LineStream, ReconnectBackoff, WatchEvent, WatchSource,
};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Connection = Result<Vec<Result<String>>>;

/// Serves scripted connections, then one that never ends
#[derive(Default)]
struct ScriptedSource {
    connections: Mutex<VecDeque<Connection>>,
    opened: AtomicUsize,
}

impl ScriptedSource {
    fn new(connections: Vec<Connection>) -> Arc<Self> {
        Arc::new(Self {
            connections: Mutex::new(connections.into()),
            opened: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl WatchSource for ScriptedSource {
    async fn open_stream(&self) -> Result<LineStream> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let next = self.connections.lock().unwrap().pop_front();
        match next {
            Some(Ok(lines)) => Ok(futures::stream::iter(lines).boxed()),
            Some(Err(e)) => Err(e),
            None => Ok(futures::stream::pending().boxed()),
        }
    }
}

fn added(uid: &str) -> Result<String> {
    Ok(format!(
        r#"{{"type":"ADDED","object":{{"apiVersion":"kubernetes-client.io/v1","kind":"ExternalSecret","metadata":{{"name":"{uid}","namespace":"default","uid":"{uid}"}},"spec":{{"backendType":"vault"}}}}}}"#
    ))
}

fn describe(event: &WatchEvent) -> String {
    match event {
        WatchEvent::Added(resource) => format!("ADDED {}", resource.identity()),
        other => other.type_name().to_string(),
    }
}

async fn collect(events: &mut ExternalSecretEvents, count: usize) -> Vec<String> {
    let mut seen = Vec::new();
    for _ in 0..count {
        let event = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .expect("timed out waiting for event")
            .expect("event stream closed");
        seen.push(describe(&event));
    }
    seen
}

async fn assert_quiet(events: &mut ExternalSecretEvents) {
    let next = tokio::time::timeout(Duration::from_millis(100), events.next()).await;
    assert!(next.is_err(), "unexpected event: {:?}", next.ok().flatten().map(|e| describe(&e)));
}

fn open(source: Arc<ScriptedSource>) -> ExternalSecretEvents {
    ExternalSecretEvents::open(source, ReconnectBackoff::new(Duration::ZERO, Duration::ZERO))
}

#[tokio::test]
async fn test_clean_end_emits_single_deleted_all() {
    let source = ScriptedSource::new(vec![
        Ok(vec![added("a")]),
        Ok(vec![added("b")]),
    ]);
    let mut events = open(source.clone());

    assert_eq!(
        collect(&mut events, 4).await,
        vec!["ADDED a", "DELETED_ALL", "ADDED b", "DELETED_ALL"]
    );
    assert_quiet(&mut events).await;
    assert_eq!(source.opened.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_transport_error_rebuilds() {
    let source = ScriptedSource::new(vec![
        Ok(vec![added("a"), Err(anyhow!("connection reset")), added("never")]),
        Ok(vec![added("b")]),
    ]);
    let mut events = open(source);

    assert_eq!(
        collect(&mut events, 4).await,
        vec!["ADDED a", "DELETED_ALL", "ADDED b", "DELETED_ALL"]
    );
}

#[tokio::test]
async fn test_invalid_line_rebuilds() {
    let source = ScriptedSource::new(vec![
        Ok(vec![added("a"), Ok("{garbage".to_string()), added("never")]),
    ]);
    let mut events = open(source);

    assert_eq!(collect(&mut events, 2).await, vec!["ADDED a", "DELETED_ALL"]);
    assert_quiet(&mut events).await;
}

#[tokio::test]
async fn test_blank_and_undecodable_lines_are_skipped() {
    let source = ScriptedSource::new(vec![Ok(vec![
        Ok(String::new()),
        Ok(r#"{"type":"ADDED","object":{"metadata":"broken"}}"#.to_string()),
        added("a"),
    ])]);
    let mut events = open(source);

    assert_eq!(collect(&mut events, 2).await, vec!["ADDED a", "DELETED_ALL"]);
}

#[tokio::test]
async fn test_failed_open_is_retried_without_deleted_all() {
    let source = ScriptedSource::new(vec![
        Err(anyhow!("forbidden")),
        Err(anyhow!("forbidden")),
        Ok(vec![added("a")]),
    ]);
    let mut events = open(source.clone());

    assert_eq!(collect(&mut events, 2).await, vec!["ADDED a", "DELETED_ALL"]);
    assert_quiet(&mut events).await;
    assert_eq!(source.opened.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_close_stops_delivery() {
    let source = ScriptedSource::new(vec![Ok(vec![added("a")])]);
    let mut events = open(source);

    assert_eq!(collect(&mut events, 1).await, vec!["ADDED a"]);
    events.close();
    events.close();

    // Anything queued before close may still drain; afterwards the stream ends
    let mut remaining = 0;
    while tokio::time::timeout(Duration::from_secs(1), events.next())
        .await
        .expect("closed stream must end")
        .is_some()
    {
        remaining += 1;
    }
    assert!(remaining <= 1);
}
