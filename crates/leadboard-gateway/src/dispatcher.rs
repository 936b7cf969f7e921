use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use leadboard_types::events::BoardEvent;

/// Fans board change events out to every connected subscriber.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// All subscribers receive all events and filter by board themselves
    broadcast_tx: broadcast::Sender<BoardEvent>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to board events. Subscribe before loading a snapshot so no
    /// change committed in between is missed.
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish an event. Call only after the change is committed.
    pub fn publish(&self, event: BoardEvent) {
        debug!("Publishing {} for board {}", event.kind(), event.board_id());
        // No receivers is fine: nobody is watching.
        let _ = self.inner.broadcast_tx.send(event);
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = BoardEvent>) {
        for event in events {
            self.publish(event);
        }
    }
}
