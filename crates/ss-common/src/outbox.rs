//! Outbox item shape shared by the store implementations and the relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StaffSyncError;
use crate::event::UserLifecycleEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "PENDING",
            OutboxStatus::Processing => "PROCESSING",
            OutboxStatus::Completed => "COMPLETED",
            OutboxStatus::Failed => "FAILED",
        }
    }
}

/// A persisted outgoing event awaiting relay to the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxItem {
    pub id: String,
    pub topic: String,
    pub partition_key: String,
    pub payload: Vec<u8>,
    pub status: OutboxStatus,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

/// An event about to be written to the outbox, in the same transaction as the
/// state change it advertises.
#[derive(Debug, Clone)]
pub struct NewOutboxItem {
    pub id: String,
    pub topic: String,
    pub partition_key: String,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl NewOutboxItem {
    pub fn new(topic: impl Into<String>, partition_key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            partition_key: partition_key.into(),
            payload,
            created_at: Utc::now(),
        }
    }

    /// Build an outbox row for a lifecycle event, keyed by the user id.
    pub fn for_event(topic: &str, event: &UserLifecycleEvent) -> Result<Self, StaffSyncError> {
        let payload = serde_json::to_vec(event)?;
        Ok(Self::new(topic, event.partition_key(), payload))
    }
}
