use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::time::Duration;
use tracing::info;

use ss_common::{NewOutboxItem, OutboxItem, OutboxStatus, StaffSyncError};

use crate::repository::OutboxRepository;

pub struct SqliteOutboxRepository {
    pool: SqlitePool,
}

impl SqliteOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outbox_items (
                id TEXT PRIMARY KEY,
                topic TEXT NOT NULL,
                partition_key TEXT NOT NULL,
                payload BLOB NOT NULL,
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

    /// Write an outgoing event in the caller's transaction. This is the only
    /// way events enter the outbox: the row commits atomically with the state
    /// change it advertises, or not at all.
    pub async fn enqueue(
        conn: &mut SqliteConnection,
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

    pub async fn count_with_status(&self, status: OutboxStatus) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM outbox_items WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") as u64)
    }
}

fn row_to_item(row: sqlx::sqlite::SqliteRow) -> Result<OutboxItem> {
    let created_at_ts: i64 = row.get("created_at");
    let created_at = DateTime::from_timestamp_millis(created_at_ts)
        .ok_or_else(|| anyhow::anyhow!("Invalid timestamp"))?;

    Ok(OutboxItem {
        id: row.get("id"),
        topic: row.get("topic"),
        partition_key: row.get("partition_key"),
        payload: row.get("payload"),
        status: OutboxStatus::Pending,
        retry_count: row.get::<i64, _>("retry_count") as u32,
        created_at,
    })
}

#[async_trait]
impl OutboxRepository for SqliteOutboxRepository {
    async fn fetch_pending(&self, limit: u32) -> Result<Vec<OutboxItem>> {
        // rowid is insertion order; created_at has only millisecond resolution.
        let rows = sqlx::query(
            "SELECT id, topic, partition_key, payload, retry_count, created_at \
             FROM outbox_items WHERE status = 'PENDING' ORDER BY rowid LIMIT $1",
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
        // SQLite has no array binds; build the placeholder list by hand.
        let placeholders = (0..ids.len())
            .map(|i| format!("${}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "UPDATE outbox_items SET status = 'PROCESSING', processed_at = $1 WHERE id IN ({placeholders})"
        );

        let mut q = sqlx::query(&query).bind(now);
        for id in ids {
            q = q.bind(id);
        }
        q.execute(&self.pool).await?;
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
            info!("Recovered {} stuck outbox items (SQLite)", recovered);
        }
        Ok(recovered)
    }
}
