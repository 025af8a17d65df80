//! # Daemon
//!
//! Keeps exactly one poller per ExternalSecret by applying watch events to a
//! registry keyed by resource identity (uid).
//!
//! | Event        | Effect                                          |
//! |--------------|-------------------------------------------------|
//! | ADDED        | stop existing poller (if any), start a new one  |
//! | MODIFIED     | same as ADDED                                   |
//! | DELETED      | stop and forget the poller (if any)             |
//! | DELETED_ALL  | stop and forget every poller                    |
//! | other        | logged, ignored                                 |
//!
//! Events are handled one at a time on the daemon's own task, so the
//! registry needs no locking.

use crate::observability::metrics;
use crate::poller::{Poller, PollerDescriptor, PollerFactory};
use crate::watch::{ExternalSecretEvents, WatchEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Requests termination of a running [`Daemon::start`]
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

pub struct Daemon {
    events: ExternalSecretEvents,
    factory: Arc<dyn PollerFactory>,
    pollers: HashMap<String, Box<dyn Poller>>,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("events", &self.events)
            .field("pollers", &self.pollers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Daemon {
    pub fn new(events: ExternalSecretEvents, factory: Arc<dyn PollerFactory>) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            events,
            factory,
            pollers: HashMap::new(),
            stop_tx: Arc::new(stop_tx),
            stop_rx,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Number of registered pollers
    pub fn poller_count(&self) -> usize {
        self.pollers.len()
    }

    pub fn has_poller(&self, identity: &str) -> bool {
        self.pollers.contains_key(identity)
    }

    /// Consume events until stopped or the event stream ends, then [`stop`](Self::stop)
    pub async fn start(&mut self) {
        info!("🚀 Daemon started, waiting for ExternalSecret events");

        loop {
            if *self.stop_rx.borrow() {
                break;
            }
            let event = tokio::select! {
                biased;
                _ = self.stop_rx.changed() => break,
                event = self.events.next() => event,
            };
            match event {
                Some(event) => self.handle_event(event),
                None => {
                    info!("ExternalSecret event stream closed");
                    break;
                }
            }
        }

        self.stop();
    }

    /// Stop every poller and close the event stream. Idempotent.
    pub fn stop(&mut self) {
        self.remove_all_pollers();
        self.events.close();
        self.stop_tx.send_replace(true);
    }

    /// Apply one event to the poller registry
    pub fn handle_event(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::Added(resource) | WatchEvent::Modified(resource) => {
                let descriptor = PollerDescriptor::from(*resource);
                self.remove_poller(&descriptor.id);
                self.add_poller(descriptor);
            }
            WatchEvent::Deleted(resource) => {
                self.remove_poller(&resource.identity());
            }
            WatchEvent::Superseded(identity) => {
                self.remove_poller(&identity);
            }
            WatchEvent::DeletedAll => {
                self.remove_all_pollers();
            }
            WatchEvent::Error(status) => {
                warn!("ExternalSecret watch reported an error: {}", status);
            }
            WatchEvent::Unknown(event_type) => {
                warn!("Unhandled ExternalSecret event type: {}", event_type);
            }
        }
        metrics::set_pollers_active(self.pollers.len());
    }

    fn add_poller(&mut self, descriptor: PollerDescriptor) {
        info!(
            "Spinning up poller for ExternalSecret {}/{}",
            descriptor.namespace, descriptor.name
        );
        let id = descriptor.id.clone();
        let mut poller = self.factory.create_poller(descriptor);
        poller.start();
        self.pollers.insert(id, poller);
    }

    fn remove_poller(&mut self, identity: &str) {
        if let Some(mut poller) = self.pollers.remove(identity) {
            debug!("Stopping poller {}", identity);
            poller.stop();
        }
    }

    fn remove_all_pollers(&mut self) {
        if !self.pollers.is_empty() {
            info!("Stopping all {} pollers", self.pollers.len());
        }
        for (_, mut poller) in self.pollers.drain() {
            poller.stop();
        }
        metrics::set_pollers_active(0);
    }
}
