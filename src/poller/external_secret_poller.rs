//! Interval task driving one ExternalSecret.

use super::sync::{run_tick, PollerContext, ReportedStatus};
use super::{Poller, PollerDescriptor, PollerFactory};
use crate::crd::ExternalSecret;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

#[derive(Debug)]
pub struct ExternalSecretPoller {
    resource: Arc<ExternalSecret>,
    context: PollerContext,
    stop_tx: Option<watch::Sender<bool>>,
}

impl ExternalSecretPoller {
    pub fn new(resource: ExternalSecret, context: PollerContext) -> Self {
        Self {
            resource: Arc::new(resource),
            context,
            stop_tx: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.stop_tx.is_some()
    }
}

impl Poller for ExternalSecretPoller {
    fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        self.stop_tx = Some(stop_tx);

        if self.context.polling_disabled {
            info!(
                "Polling disabled, registered ExternalSecret {}/{} without syncing",
                self.resource.namespace_or_default(),
                self.resource.name_or_unknown()
            );
            return;
        }

        debug!(
            "Starting poller for ExternalSecret {}/{}",
            self.resource.namespace_or_default(),
            self.resource.name_or_unknown()
        );
        tokio::spawn(poll(
            Arc::clone(&self.resource),
            self.context.clone(),
            stop_rx,
        ));
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            debug!(
                "Stopping poller for ExternalSecret {}/{}",
                self.resource.namespace_or_default(),
                self.resource.name_or_unknown()
            );
            let _ = stop_tx.send(true);
        }
    }
}

impl Drop for ExternalSecretPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll(resource: Arc<ExternalSecret>, context: PollerContext, mut stop: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(context.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut reported = ReportedStatus::from_resource(&resource);

    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            _ = interval.tick() => {}
        }
        if *stop.borrow() {
            break;
        }
        run_tick(&context, &resource, &mut reported).await;
    }
}

/// Creates [`ExternalSecretPoller`]s sharing one [`PollerContext`]
#[derive(Debug, Clone)]
pub struct ExternalSecretPollerFactory {
    context: PollerContext,
}

impl ExternalSecretPollerFactory {
    pub fn new(context: PollerContext) -> Self {
        Self { context }
    }
}

impl PollerFactory for ExternalSecretPollerFactory {
    fn create_poller(&self, descriptor: PollerDescriptor) -> Box<dyn Poller> {
        Box::new(ExternalSecretPoller::new(
            descriptor.resource,
            self.context.clone(),
        ))
    }
}
