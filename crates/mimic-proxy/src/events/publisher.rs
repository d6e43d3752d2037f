//! Publisher port and the shipped fan-out implementation.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use super::Event;

/// Delivery port for traffic events.
///
/// Publishing is best-effort and must never block or fail an exchange; with
/// no observer bound to the client id it is a no-op.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, client_id: &str, event: Event);
}

/// Publisher that drops everything. Used when no observer surface is wired
/// up, and in tests that do not care about events.
#[derive(Debug, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _client_id: &str, _event: Event) {}
}

/// Fans events out over one broadcast channel per client id.
///
/// A delivery transport subscribes with [`BroadcastPublisher::subscribe`] and
/// drains the receiver; lagging observers lose oldest events rather than
/// applying backpressure to the handler.
pub struct BroadcastPublisher {
    capacity: usize,
    channels: RwLock<HashMap<String, broadcast::Sender<Event>>>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Bind an observer to a client id.
    pub fn subscribe(&self, client_id: &str) -> broadcast::Receiver<Event> {
        let mut channels = self.channels.write();
        channels
            .entry(client_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, client_id: &str, event: Event) {
        let stale = {
            let channels = self.channels.read();
            match channels.get(client_id) {
                Some(tx) => tx.send(event).is_err() && tx.receiver_count() == 0,
                None => {
                    trace!(client = client_id, "no observers bound, event dropped");
                    false
                }
            }
        };

        // All observers went away; drop the channel so the map does not grow
        // with every client that ever connected.
        if stale {
            self.channels.write().remove(client_id);
        }
    }
}
