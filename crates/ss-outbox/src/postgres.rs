use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row};
use std::time::Duration;
use tracing::info;

use ss_common::{NewOutboxItem, OutboxItem, OutboxStatus, StaffSyncError};

use crate::repository::OutboxRepository;

pub struct PostgresOutboxRepository {
    pool: PgPool,
}

impl PostgresOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outbox_items (
                seq BIGSERIAL,
                id TEXT PRIMARY KEY,
                topic TEXT NOT NULL,
                partition_key TEXT NOT NULL,
                payload BYTEA NOT NULL,
                status TEXT NOT NULL DEFAULT 'PENDING',
                retry_count INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                created_at BIGINT NOT NULL,
                processed_at BIGINT
            );
            CREATE INDEX IF NOT EXISTS idx_outbox_status ON outbox_items(status, created_at);
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Write an outgoing event in the caller's transaction.
    pub async fn enqueue(
        conn: &mut PgConnection,
        item: &NewOutboxItem,
    ) -> std::result::Result<(), StaffSyncError> {
        sqlx::query(
            "INSERT INTO outbox_items (id, topic, partition_key, payload, status, retry_count, created_at) \
             VALUES ($1, $2, $3, $4, 'PENDING', 0, $5)",
        )
        .bind(&item.id)
        .bind(&item.topic)
        .bind(&item.partition_key)
        .bind(&item.payload)
        .bind(item.created_at.timestamp_millis())
        .execute(conn)
        .await?;
        Ok(())
    }
}

fn row_to_item(row: sqlx::postgres::PgRow) -> Result<OutboxItem> {
    let created_at_ts: i64 = row.get("created_at");
    let created_at = DateTime::from_timestamp_millis(created_at_ts)
        .ok_or_else(|| anyhow::anyhow!("Invalid timestamp"))?;

    Ok(OutboxItem {
        id: row.get("id"),
        topic: row.get("topic"),
        partition_key: row.get("partition_key"),
        payload: row.get("payload"),
        status: OutboxStatus::Pending,
        retry_count: row.get::<i32, _>("retry_count") as u32,
        created_at,
    })
}

#[async_trait]
impl OutboxRepository for PostgresOutboxRepository {
    async fn fetch_pending(&self, limit: u32) -> Result<Vec<OutboxItem>> {
        // seq is insertion order; created_at has only millisecond resolution.
        let rows = sqlx::query(
            "SELECT id, topic, partition_key, payload, retry_count, created_at \
             FROM outbox_items WHERE status = 'PENDING' ORDER BY seq LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_item).collect()
    }

    async fn mark_processing(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let now = Utc::now().timestamp_millis();
        sqlx::query("UPDATE outbox_items SET status = 'PROCESSING', processed_at = $1 WHERE id = ANY($2)")
            .bind(now)
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_completed(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE outbox_items SET status = 'COMPLETED', error_message = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_retry(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE outbox_items SET status = 'PENDING', retry_count = retry_count + 1, \
             error_message = $1, processed_at = NULL WHERE id = $2",
        )
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_deferred(&self, id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE outbox_items SET status = 'PENDING', processed_at = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query("UPDATE outbox_items SET status = 'FAILED', error_message = $1 WHERE id = $2")
            .bind(error)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn recover_stuck(&self, timeout: Duration) -> Result<u64> {
        let cutoff = Utc::now().timestamp_millis() - timeout.as_millis() as i64;

        let result = sqlx::query(
            "UPDATE outbox_items SET status = 'PENDING', processed_at = NULL \
             WHERE status = 'PROCESSING' AND processed_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        let recovered = result.rows_affected();
        if recovered > 0 {
            info!("Recovered {} stuck outbox items (PostgreSQL)", recovered);
        }
        Ok(recovered)
    }
}
