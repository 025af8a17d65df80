//! Single-producer, single-consumer event queue.
//!
//! `put` never blocks and never drops; `take` waits until an event is queued.

use super::WatchEvent;
use tokio::sync::mpsc;

/// Producing half, owned by the watch task
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<WatchEvent>,
}

/// Consuming half, owned by the daemon
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<WatchEvent>,
}

pub fn event_queue() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}

impl EventSender {
    /// Append an event; returns false once the consumer is gone
    pub fn put(&self, event: WatchEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl EventReceiver {
    /// Next event in arrival order, or `None` once every sender is dropped
    pub async fn take(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    /// Refuse further events; already queued events can still be taken
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let (tx, mut rx) = event_queue();
        assert!(tx.put(WatchEvent::Unknown("1".into())));
        assert!(tx.put(WatchEvent::DeletedAll));
        assert!(tx.put(WatchEvent::Unknown("3".into())));

        assert_eq!(rx.take().await.unwrap().type_name(), "1");
        assert_eq!(rx.take().await.unwrap().type_name(), "DELETED_ALL");
        assert_eq!(rx.take().await.unwrap().type_name(), "3");
    }

    #[tokio::test]
    async fn test_pending_take_is_resolved_by_put() {
        let (tx, mut rx) = event_queue();
        let taker = tokio::spawn(async move { rx.take().await.map(|e| e.type_name().to_string()) });
        tokio::task::yield_now().await;
        tx.put(WatchEvent::DeletedAll);
        assert_eq!(taker.await.unwrap().as_deref(), Some("DELETED_ALL"));
    }

    #[tokio::test]
    async fn test_put_after_close_fails() {
        let (tx, mut rx) = event_queue();
        rx.close();
        assert!(!tx.put(WatchEvent::DeletedAll));
        assert!(tx.is_closed());
    }
}
