//! Employee and department stores (sqlx/SQLite).
//!
//! Same split as the user store: reads through the pool, writes as static
//! functions over a connection so they compose with the outbox enqueue in one
//! transaction.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};

use ss_common::StaffSyncError;

use crate::domain::{DepartmentRecord, EmployeeRecord};

pub struct EmployeeStore {
    pool: SqlitePool,
}

impl EmployeeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn init_schema(&self) -> Result<(), StaffSyncError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS employees (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE,
                employee_id TEXT NOT NULL,
                email TEXT NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                status TEXT NOT NULL,
                department_id INTEGER,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_employees_department ON employees(department_id);
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<EmployeeRecord>, StaffSyncError> {
        let row = sqlx::query(&select("WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_employee).transpose()
    }

    pub async fn find_by_user_id(
        &self,
        user_id: i64,
    ) -> Result<Option<EmployeeRecord>, StaffSyncError> {
        let row = sqlx::query(&select("WHERE user_id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_employee).transpose()
    }

    pub async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<EmployeeRecord>, StaffSyncError> {
        let row = sqlx::query(&select("WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_employee).transpose()
    }

    pub async fn exists_by_user_id(&self, user_id: i64) -> Result<bool, StaffSyncError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM employees WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") > 0)
    }

    pub async fn exists_by_email(&self, email: &str) -> Result<bool, StaffSyncError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM employees WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") > 0)
    }

    pub async fn list(&self) -> Result<Vec<EmployeeRecord>, StaffSyncError> {
        let rows = sqlx::query(&select("ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_employee).collect()
    }

    pub async fn list_by_department(
        &self,
        department_id: i64,
    ) -> Result<Vec<EmployeeRecord>, StaffSyncError> {
        let rows = sqlx::query(&select("WHERE department_id = $1 ORDER BY id"))
            .bind(department_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_employee).collect()
    }

    pub async fn find_by_id_in(
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<EmployeeRecord>, StaffSyncError> {
        let row = sqlx::query(&select("WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
        row.map(row_to_employee).transpose()
    }

    /// Insert with a store-assigned id. Returns the new id.
    pub async fn insert(
        conn: &mut SqliteConnection,
        record: &EmployeeRecord,
    ) -> Result<i64, StaffSyncError> {
        let result = sqlx::query(
            "INSERT INTO employees (user_id, employee_id, email, first_name, last_name, \
             status, department_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(record.user_id)
        .bind(&record.employee_id)
        .bind(&record.email)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.status)
        .bind(record.department_id)
        .bind(record.created_at.timestamp_millis())
        .bind(record.updated_at.timestamp_millis())
        .execute(conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn update(
        conn: &mut SqliteConnection,
        record: &EmployeeRecord,
    ) -> Result<(), StaffSyncError> {
        sqlx::query(
            "UPDATE employees SET employee_id = $1, email = $2, first_name = $3, \
             last_name = $4, status = $5, department_id = $6, updated_at = $7 WHERE id = $8",
        )
        .bind(&record.employee_id)
        .bind(&record.email)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.status)
        .bind(record.department_id)
        .bind(record.updated_at.timestamp_millis())
        .bind(record.id)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<u64, StaffSyncError> {
        let result = sqlx::query("DELETE FROM employees WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_user_id(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<u64, StaffSyncError> {
        let result = sqlx::query("DELETE FROM employees WHERE user_id = $1")
            .bind(user_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }
}

fn select(suffix: &str) -> String {
    format!(
        "SELECT id, user_id, employee_id, email, first_name, last_name, status, \
         department_id, created_at, updated_at FROM employees {suffix}"
    )
}

fn timestamp(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<DateTime<Utc>, StaffSyncError> {
    let millis: i64 = row.get(column);
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StaffSyncError::internal(format!("Invalid {column} timestamp")))
}

fn row_to_employee(row: sqlx::sqlite::SqliteRow) -> Result<EmployeeRecord, StaffSyncError> {
    Ok(EmployeeRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        employee_id: row.get("employee_id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        status: row.get("status"),
        department_id: row.get("department_id"),
        created_at: timestamp(&row, "created_at")?,
        updated_at: timestamp(&row, "updated_at")?,
    })
}

pub struct DepartmentStore {
    pool: SqlitePool,
}

impl DepartmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn init_schema(&self) -> Result<(), StaffSyncError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS departments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                slug TEXT NOT NULL,
                description TEXT,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<DepartmentRecord>, StaffSyncError> {
        let row = sqlx::query(
            "SELECT id, name, slug, description, created_at, updated_at \
             FROM departments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_department).transpose()
    }

    pub async fn exists_by_name(&self, name: &str) -> Result<bool, StaffSyncError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM departments WHERE name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") > 0)
    }

    pub async fn list(&self) -> Result<Vec<DepartmentRecord>, StaffSyncError> {
        let rows = sqlx::query(
            "SELECT id, name, slug, description, created_at, updated_at \
             FROM departments ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_department).collect()
    }

    pub async fn find_by_id_in(
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<DepartmentRecord>, StaffSyncError> {
        let row = sqlx::query(
            "SELECT id, name, slug, description, created_at, updated_at \
             FROM departments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;
        row.map(row_to_department).transpose()
    }

    pub async fn insert(
        conn: &mut SqliteConnection,
        record: &DepartmentRecord,
    ) -> Result<i64, StaffSyncError> {
        let result = sqlx::query(
            "INSERT INTO departments (name, slug, description, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&record.name)
        .bind(&record.slug)
        .bind(&record.description)
        .bind(record.created_at.timestamp_millis())
        .bind(record.updated_at.timestamp_millis())
        .execute(conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn update(
        conn: &mut SqliteConnection,
        record: &DepartmentRecord,
    ) -> Result<(), StaffSyncError> {
        sqlx::query(
            "UPDATE departments SET name = $1, description = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(&record.name)
        .bind(&record.description)
        .bind(record.updated_at.timestamp_millis())
        .bind(record.id)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<u64, StaffSyncError> {
        let result = sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_department(row: sqlx::sqlite::SqliteRow) -> Result<DepartmentRecord, StaffSyncError> {
    Ok(DepartmentRecord {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        created_at: timestamp(&row, "created_at")?,
        updated_at: timestamp(&row, "updated_at")?,
    })
}
