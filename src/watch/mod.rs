//! # Watch Event Stream
//!
//! A single, never-ending stream of ExternalSecret lifecycle events.
//!
//! A background task reads the line-delimited JSON watch stream from the API
//! server and feeds parsed events into a FIFO queue consumed by the daemon.
//! Whenever a connection is lost, ends, or delivers a line that is not JSON,
//! the task emits [`WatchEvent::DeletedAll`] and opens a new connection, so
//! the consumer rebuilds its state from the fresh `ADDED` events.

mod event;
mod queue;
mod source;
mod stream;

pub use event::{parse_event_line, WatchError, WatchEvent};
pub use queue::{event_queue, EventReceiver, EventSender};
pub use source::{KubeWatchSource, LineStream, WatchSource};
pub use stream::{ExternalSecretEvents, ReconnectBackoff};
