//! Transactional outbox
//!
//! The producer side of the sync protocol. Services never publish to the bus
//! directly: a mutation writes its lifecycle event into `outbox_items` inside
//! the same transaction as the row change, and the relay drains the table
//! afterwards. A crash between commit and publish loses nothing; the event is
//! still in the outbox and is relayed on the next poll.

pub mod repository;

#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use ss_bus::EventPublisher;

pub use repository::OutboxRepository;

#[derive(Debug, Clone)]
pub struct OutboxRelayConfig {
    pub poll_interval: Duration,
    pub batch_size: u32,
    /// Publish attempts before an item is marked FAILED.
    pub max_retries: u32,
    /// PROCESSING items older than this are assumed orphaned by a crash.
    pub stuck_timeout: Duration,
}

impl Default for OutboxRelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            batch_size: 50,
            max_retries: 5,
            stuck_timeout: Duration::from_secs(60),
        }
    }
}

pub struct OutboxRelay {
    repository: Arc<dyn OutboxRepository>,
    publisher: Arc<dyn EventPublisher>,
    config: OutboxRelayConfig,
}

impl OutboxRelay {
    pub fn new(
        repository: Arc<dyn OutboxRepository>,
        publisher: Arc<dyn EventPublisher>,
        config: OutboxRelayConfig,
    ) -> Self {
        Self {
            repository,
            publisher,
            config,
        }
    }

    pub async fn start(&self) {
        info!("Starting outbox relay");
        loop {
            if let Err(e) = self.repository.recover_stuck(self.config.stuck_timeout).await {
                error!("Error recovering stuck outbox items: {}", e);
            }
            if let Err(e) = self.process_batch().await {
                error!("Error processing outbox batch: {}", e);
            }
            sleep(self.config.poll_interval).await;
        }
    }

    /// Relay one batch of pending items in creation order. Returns how many
    /// were published. When a publish fails, later items sharing its partition
    /// key are skipped for this batch so per-key ordering survives the retry.
    pub async fn process_batch(&self) -> Result<usize> {
        let items = self.repository.fetch_pending(self.config.batch_size).await?;
        if items.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        self.repository.mark_processing(&ids).await?;

        let mut published = 0usize;
        let mut blocked_keys: HashSet<String> = HashSet::new();

        for item in items {
            if blocked_keys.contains(&item.partition_key) {
                // A deferral is not a publish attempt; retry_count stays put.
                debug!("Outbox item [{}] deferred behind failed key {}", item.id, item.partition_key);
                self.repository.mark_deferred(&item.id).await?;
                continue;
            }

            match self
                .publisher
                .publish(&item.topic, &item.partition_key, item.payload.clone())
                .await
            {
                Ok(()) => {
                    self.repository.mark_completed(&item.id).await?;
                    published += 1;
                }
                Err(e) => {
                    warn!("Failed to publish outbox item [{}]: {}", item.id, e);
                    blocked_keys.insert(item.partition_key.clone());

                    if item.retry_count + 1 >= self.config.max_retries {
                        error!(
                            "Outbox item [{}] exhausted {} retries, marking FAILED",
                            item.id, self.config.max_retries
                        );
                        self.repository.mark_failed(&item.id, &e.to_string()).await?;
                    } else {
                        self.repository.mark_retry(&item.id, &e.to_string()).await?;
                    }
                }
            }
        }

        Ok(published)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::sqlite::SqliteOutboxRepository;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;
    use ss_bus::BusError;
    use ss_common::{NewOutboxItem, OutboxStatus, UserLifecycleEvent};

    struct RecordingPublisher {
        sent: Mutex<Vec<(String, String)>>,
        fail: Mutex<bool>,
    }

    impl RecordingPublisher {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: Mutex::new(false),
            }
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, topic: &str, key: &str, _payload: Vec<u8>) -> Result<(), BusError> {
            if *self.fail.lock() {
                return Err(BusError::Publish("bus unavailable".to_string()));
            }
            self.sent.lock().push((topic.to_string(), key.to_string()));
            Ok(())
        }
    }

    async fn setup() -> (SqlitePool, Arc<SqliteOutboxRepository>) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let repo = Arc::new(SqliteOutboxRepository::new(pool.clone()));
        repo.init_schema().await.unwrap();
        (pool, repo)
    }

    async fn enqueue_event(pool: &SqlitePool, id: i64) {
        let event = UserLifecycleEvent::deleted(id);
        let item = NewOutboxItem::for_event("staffsync.user.deleted", &event).unwrap();
        let mut tx = pool.begin().await.unwrap();
        SqliteOutboxRepository::enqueue(&mut tx, &item).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn enqueued_events_are_relayed_in_order() {
        let (pool, repo) = setup().await;
        enqueue_event(&pool, 1).await;
        enqueue_event(&pool, 2).await;

        let publisher = Arc::new(RecordingPublisher::new());
        let relay = OutboxRelay::new(repo.clone(), publisher.clone(), OutboxRelayConfig::default());

        let published = relay.process_batch().await.unwrap();
        assert_eq!(published, 2);

        let sent = publisher.sent.lock().clone();
        assert_eq!(sent[0].1, "1");
        assert_eq!(sent[1].1, "2");
        assert_eq!(repo.count_with_status(OutboxStatus::Completed).await.unwrap(), 2);
        assert_eq!(repo.count_with_status(OutboxStatus::Pending).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_publish_keeps_item_for_retry() {
        let (pool, repo) = setup().await;
        enqueue_event(&pool, 7).await;

        let publisher = Arc::new(RecordingPublisher::new());
        *publisher.fail.lock() = true;
        let relay = OutboxRelay::new(repo.clone(), publisher.clone(), OutboxRelayConfig::default());

        assert_eq!(relay.process_batch().await.unwrap(), 0);
        assert_eq!(repo.count_with_status(OutboxStatus::Pending).await.unwrap(), 1);

        // Bus comes back; the same item is relayed.
        *publisher.fail.lock() = false;
        assert_eq!(relay.process_batch().await.unwrap(), 1);
        assert_eq!(repo.count_with_status(OutboxStatus::Completed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_mark_failed() {
        let (pool, repo) = setup().await;
        enqueue_event(&pool, 9).await;

        let publisher = Arc::new(RecordingPublisher::new());
        *publisher.fail.lock() = true;
        let config = OutboxRelayConfig {
            max_retries: 2,
            ..Default::default()
        };
        let relay = OutboxRelay::new(repo.clone(), publisher, config);

        relay.process_batch().await.unwrap();
        relay.process_batch().await.unwrap();

        assert_eq!(repo.count_with_status(OutboxStatus::Failed).await.unwrap(), 1);
        assert_eq!(repo.count_with_status(OutboxStatus::Pending).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deferred_items_keep_their_retry_budget() {
        let (pool, repo) = setup().await;
        // Same partition key: the second item is deferred while the first fails.
        enqueue_event(&pool, 4).await;
        enqueue_event(&pool, 4).await;

        let publisher = Arc::new(RecordingPublisher::new());
        *publisher.fail.lock() = true;
        let config = OutboxRelayConfig {
            max_retries: 2,
            ..Default::default()
        };
        let relay = OutboxRelay::new(repo.clone(), publisher.clone(), config);

        // Two batches exhaust the first item's attempts. The second item was
        // only ever deferred, so it must still be waiting, not FAILED.
        relay.process_batch().await.unwrap();
        relay.process_batch().await.unwrap();
        assert_eq!(repo.count_with_status(OutboxStatus::Failed).await.unwrap(), 1);
        assert_eq!(repo.count_with_status(OutboxStatus::Pending).await.unwrap(), 1);

        // Bus recovers; the deferred item goes out with a clean attempt count.
        *publisher.fail.lock() = false;
        assert_eq!(relay.process_batch().await.unwrap(), 1);
        assert_eq!(repo.count_with_status(OutboxStatus::Completed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rolled_back_transactions_leave_no_outbox_row() {
        let (pool, repo) = setup().await;

        let event = UserLifecycleEvent::deleted(3);
        let item = NewOutboxItem::for_event("staffsync.user.deleted", &event).unwrap();
        let mut tx = pool.begin().await.unwrap();
        SqliteOutboxRepository::enqueue(&mut tx, &item).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(repo.count_with_status(OutboxStatus::Pending).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stuck_processing_items_are_recovered() {
        let (pool, repo) = setup().await;
        enqueue_event(&pool, 5).await;

        let pending = repo.fetch_pending(10).await.unwrap();
        let ids: Vec<String> = pending.iter().map(|i| i.id.clone()).collect();
        repo.mark_processing(&ids).await.unwrap();
        assert_eq!(repo.count_with_status(OutboxStatus::Pending).await.unwrap(), 0);

        // Zero timeout treats every PROCESSING item as orphaned.
        let recovered = repo.recover_stuck(Duration::from_millis(0)).await.unwrap();
        assert_eq!(recovered, 1);
        assert_eq!(repo.count_with_status(OutboxStatus::Pending).await.unwrap(), 1);
    }
}
