//! Reconnecting watch task.

use super::queue::{event_queue, EventReceiver, EventSender};
use super::source::WatchSource;
use super::{parse_event_line, WatchEvent};
use crate::observability::metrics;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Exponential delay between watch reconnects
///
/// A zero minimum reconnects immediately every time.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectBackoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl ReconnectBackoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            max,
            current: min,
        }
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }
}

/// The event stream consumed by the daemon
#[derive(Debug)]
pub struct ExternalSecretEvents {
    receiver: EventReceiver,
    watcher: Option<JoinHandle<()>>,
}

impl ExternalSecretEvents {
    /// Start watching through `source`
    pub fn open(source: Arc<dyn WatchSource>, backoff: ReconnectBackoff) -> Self {
        let (sender, receiver) = event_queue();
        let watcher = tokio::spawn(run_watch(source, sender, backoff));
        Self {
            receiver,
            watcher: Some(watcher),
        }
    }

    /// Events fed by hand; used by tests and replay tooling
    pub fn from_receiver(receiver: EventReceiver) -> Self {
        Self {
            receiver,
            watcher: None,
        }
    }

    /// Next event; `None` once the stream was closed
    pub async fn next(&mut self) -> Option<WatchEvent> {
        self.receiver.take().await
    }

    /// Stop the watch task and refuse further events. Idempotent.
    pub fn close(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        self.receiver.close();
    }
}

impl Drop for ExternalSecretEvents {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

async fn run_watch(source: Arc<dyn WatchSource>, sender: EventSender, mut backoff: ReconnectBackoff) {
    while !sender.is_closed() {
        let mut lines = match source.open_stream().await {
            Ok(lines) => lines,
            Err(e) => {
                error!("Failed to open ExternalSecret watch: {:#}", e);
                metrics::increment_watch_restarts("open_failed");
                tokio::time::sleep(backoff.next_delay()).await;
                continue;
            }
        };

        info!("👀 Watching ExternalSecrets");

        let mut delivered = false;
        let reason = loop {
            match lines.next().await {
                None => break "end",
                Some(Err(e)) => {
                    warn!("ExternalSecret watch stream failed: {:#}", e);
                    break "error";
                }
                Some(Ok(line)) => match parse_event_line(&line) {
                    Ok(Some(event)) => {
                        delivered = true;
                        if !sender.put(event) {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Dropping ExternalSecret watch connection: {}", e);
                        break "error";
                    }
                },
            }
        };
        drop(lines);

        info!("🔄 ExternalSecret watch closed ({}), rebuilding pollers", reason);
        metrics::increment_watch_restarts(reason);

        if !sender.put(WatchEvent::DeletedAll) {
            return;
        }

        if delivered {
            backoff.reset();
        }
        let delay = backoff.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let mut backoff = ReconnectBackoff::new(Duration::from_millis(250), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_backoff_reconnects_immediately() {
        let mut backoff = ReconnectBackoff::new(Duration::ZERO, Duration::from_secs(30));
        assert_eq!(backoff.next_delay(), Duration::ZERO);
        assert_eq!(backoff.next_delay(), Duration::ZERO);
    }
}
