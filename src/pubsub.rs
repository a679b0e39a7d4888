//! Pub/sub bus contract (spec §6) plus a simple in-memory implementation.
//!
//! The bus is an injected capability, never a crate-global: an Agent
//! server without one configured refuses async sends outright rather than
//! silently queueing (spec §9).

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::warn;

/// Fire-and-forget, best-effort delivery: a broadcast with no subscribers
/// is not an error, and a send error is logged, never propagated as a
/// turn-ending failure.
pub trait PubSub: Send + Sync {
    fn subscribe(&self, topic: &str) -> broadcast::Receiver<serde_json::Value>;
    fn broadcast(&self, topic: &str, message: serde_json::Value);
}

/// In-process pub/sub backed by one `tokio::sync::broadcast` channel per
/// topic, created lazily on first subscribe/broadcast.
pub struct InMemoryPubSub {
    channels: Mutex<HashMap<String, broadcast::Sender<serde_json::Value>>>,
    capacity: usize,
}

impl Default for InMemoryPubSub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl InMemoryPubSub {
    pub fn new(capacity: usize) -> Self {
        InMemoryPubSub { channels: Mutex::new(HashMap::new()), capacity }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<serde_json::Value> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl PubSub for InMemoryPubSub {
    fn subscribe(&self, topic: &str) -> broadcast::Receiver<serde_json::Value> {
        self.sender_for(topic).subscribe()
    }

    fn broadcast(&self, topic: &str, message: serde_json::Value) {
        let sender = self.sender_for(topic);
        if sender.send(message).is_err() {
            warn!(topic, "broadcast had no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_is_delivered_to_subscriber() {
        let bus = InMemoryPubSub::default();
        let mut rx = bus.subscribe("agent:x:responses");
        bus.broadcast("agent:x:responses", serde_json::json!({"ok": true}));
        let received = rx.recv().await.unwrap();
        assert_eq!(received, serde_json::json!({"ok": true}));
    }

    #[test]
    fn broadcast_with_no_subscribers_does_not_panic() {
        let bus = InMemoryPubSub::default();
        bus.broadcast("nobody:listening", serde_json::json!({}));
    }
}
