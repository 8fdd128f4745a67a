//! User store (sqlx/SQLite).
//!
//! Reads go through the pool; writes are static functions over a connection
//! so the service layer can run them inside the same transaction as the
//! outbox enqueue.

use sqlx::{Row, SqliteConnection, SqlitePool};
use std::str::FromStr;

use ss_common::{Role, StaffSyncError};

use crate::domain::UserRecord;

pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn init_schema(&self) -> Result<(), StaffSyncError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, StaffSyncError> {
        let row = sqlx::query("SELECT id, email, password_hash, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_user).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StaffSyncError> {
        let row = sqlx::query("SELECT id, email, password_hash, role FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_user).transpose()
    }

    pub async fn exists_by_email(&self, email: &str) -> Result<bool, StaffSyncError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") > 0)
    }

    pub async fn list(&self) -> Result<Vec<UserRecord>, StaffSyncError> {
        let rows = sqlx::query("SELECT id, email, password_hash, role FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_user).collect()
    }

    /// Transaction-scoped lookup for read-modify-write sequences.
    pub async fn find_by_id_in(
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<UserRecord>, StaffSyncError> {
        let row = sqlx::query("SELECT id, email, password_hash, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        row.map(row_to_user).transpose()
    }

    /// Insert with a store-assigned id. Returns the new id.
    pub async fn insert(
        conn: &mut SqliteConnection,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<i64, StaffSyncError> {
        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, role) VALUES ($1, $2, $3)",
        )
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .execute(conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Insert with an externally-assigned id (event-driven replication keeps
    /// the user id identical in both stores).
    pub async fn insert_with_id(
        conn: &mut SqliteConnection,
        record: &UserRecord,
    ) -> Result<(), StaffSyncError> {
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, role) VALUES ($1, $2, $3, $4)",
        )
        .bind(record.id)
        .bind(&record.email)
        .bind(&record.password_hash)
        .bind(record.role.as_str())
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn update(
        conn: &mut SqliteConnection,
        record: &UserRecord,
    ) -> Result<(), StaffSyncError> {
        sqlx::query("UPDATE users SET email = $1, password_hash = $2, role = $3 WHERE id = $4")
            .bind(&record.email)
            .bind(&record.password_hash)
            .bind(record.role.as_str())
            .bind(record.id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Returns how many rows were deleted (0 when the user was absent).
    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<u64, StaffSyncError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_user(row: sqlx::sqlite::SqliteRow) -> Result<UserRecord, StaffSyncError> {
    let role: String = row.get("role");
    Ok(UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: Role::from_str(&role)?,
    })
}
