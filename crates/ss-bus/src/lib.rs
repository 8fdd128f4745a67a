//! StaffSync event bus layer
//!
//! The bus contract is at-least-once, partitioned pub/sub with ordering
//! preserved per partition key. This crate provides:
//! - Topic routing for the three user-lifecycle streams
//! - The JSON codec with loud decode failures
//! - The [`EventPublisher`] seam used by the outbox relay
//! - An in-memory bus for development and tests
//! - An HTTP bridge transport for cross-process delivery
//! - The consumer dispatcher with per-message timeout, bounded retries and a
//!   dead-letter sink

pub mod codec;
pub mod consumer;
pub mod http;
pub mod memory;
pub mod topic;

use async_trait::async_trait;
use thiserror::Error;

pub use consumer::{
    ConsumerConfig, DeadLetter, DeadLetterSink, EventDispatcher, EventHandler,
    LogDeadLetterSink, MemoryDeadLetterSink, run_consumer,
};
pub use http::{HttpEventPublisher, ingest_router};
pub use memory::{Delivery, InMemoryBus};
pub use topic::{TOPIC_USER_CREATED, TOPIC_USER_DELETED, TOPIC_USER_UPDATED, topic_for};

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Bus closed")]
    Closed,
}

/// Publishes an encoded event to a topic, keyed so the bus can preserve
/// per-user ordering. One send per call; failures propagate to the caller.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), BusError>;
}
