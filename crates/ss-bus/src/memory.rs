//! In-memory bus for development and tests
//!
//! Single-process transport: every subscriber gets its own unbounded channel
//! per topic. Deliveries are fanned out in publish order, so per-key ordering
//! holds trivially (total order per subscriber). At-least-once semantics come
//! from the relay retrying failed publishes, not from the channel itself.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::warn;

use crate::{BusError, EventPublisher};

/// A message as received from the bus.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

#[derive(Default)]
pub struct InMemoryBus {
    subscribers: DashMap<String, Vec<mpsc::UnboundedSender<Delivery>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a topic. Deliveries published before the subscription are
    /// not replayed, so consumers must be wired before relays start.
    pub fn subscribe(&self, topic: &str) -> mpsc::UnboundedReceiver<Delivery> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.entry(topic.to_string()).or_default().push(tx);
        rx
    }
}

#[async_trait]
impl EventPublisher for InMemoryBus {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let mut delivered = 0usize;

        if let Some(mut senders) = self.subscribers.get_mut(topic) {
            senders.retain(|tx| {
                let ok = tx
                    .send(Delivery {
                        topic: topic.to_string(),
                        key: key.to_string(),
                        payload: payload.clone(),
                    })
                    .is_ok();
                if ok {
                    delivered += 1;
                }
                ok
            });
        }

        if delivered == 0 {
            warn!(topic, key, "No live subscribers for topic, event dropped");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deliveries_arrive_in_publish_order() {
        let bus = InMemoryBus::new();
        let mut rx = bus.subscribe("t");

        for i in 0..5u8 {
            bus.publish("t", "k", vec![i]).await.unwrap();
        }

        for i in 0..5u8 {
            let delivery = rx.recv().await.unwrap();
            assert_eq!(delivery.payload, vec![i]);
            assert_eq!(delivery.key, "k");
        }
    }

    #[tokio::test]
    async fn each_subscriber_sees_every_event() {
        let bus = InMemoryBus::new();
        let mut a = bus.subscribe("t");
        let mut b = bus.subscribe("t");

        bus.publish("t", "1", b"x".to_vec()).await.unwrap();

        assert_eq!(a.recv().await.unwrap().payload, b"x");
        assert_eq!(b.recv().await.unwrap().payload, b"x");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let bus = InMemoryBus::new();
        assert!(bus.publish("empty", "1", vec![]).await.is_ok());
    }
}
