use anyhow::Result;
use async_trait::async_trait;
use ss_common::OutboxItem;
use std::time::Duration;

/// Relay-facing view of the outbox table. Writing into the outbox happens on
/// the store implementations directly, inside the mutation's transaction.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Oldest pending items first; relay order is publish order.
    async fn fetch_pending(&self, limit: u32) -> Result<Vec<OutboxItem>>;

    async fn mark_processing(&self, ids: &[String]) -> Result<()>;

    async fn mark_completed(&self, id: &str) -> Result<()>;

    /// Return the item to PENDING with an incremented retry count.
    async fn mark_retry(&self, id: &str, error: &str) -> Result<()>;

    /// Return the item to PENDING without counting an attempt. Used when an
    /// item is skipped behind an earlier failure on its partition key.
    async fn mark_deferred(&self, id: &str) -> Result<()>;

    /// Terminal failure; the item needs operator attention.
    async fn mark_failed(&self, id: &str, error: &str) -> Result<()>;

    /// Items stuck in PROCESSING longer than `timeout` (relay crashed between
    /// claim and completion) go back to PENDING. Returns how many recovered.
    async fn recover_stuck(&self, timeout: Duration) -> Result<u64>;
}
