//! First-run seeding.
//!
//! On a fresh store this creates the default department. The bootstrap admin
//! login is seeded on the auth side, which owns user id assignment; ADMIN
//! users have no employee record, so nothing is seeded here for them.

use chrono::Utc;
use tracing::info;

use ss_common::StaffSyncError;

use crate::domain::DepartmentRecord;
use crate::repository::DepartmentStore;

#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub department_name: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            department_name: "General".to_string(),
        }
    }
}

pub struct DefaultSeeder {
    departments: DepartmentStore,
    config: SeedConfig,
}

impl DefaultSeeder {
    pub fn new(departments: DepartmentStore, config: SeedConfig) -> Self {
        Self {
            departments,
            config,
        }
    }

    /// Re-running against a store that already has the department is a no-op.
    pub async fn run(&self) -> Result<(), StaffSyncError> {
        if self
            .departments
            .exists_by_name(&self.config.department_name)
            .await?
        {
            return Ok(());
        }

        let now = Utc::now();
        let record = DepartmentRecord {
            id: 0,
            name: self.config.department_name.clone(),
            slug: self.config.department_name.to_lowercase(),
            description: Some("Default department".to_string()),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.departments.pool().begin().await?;
        let id = DepartmentStore::insert(&mut tx, &record).await?;
        tx.commit().await?;

        info!(department_id = id, "Seeded default department");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn seeder() -> DefaultSeeder {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let departments = DepartmentStore::new(pool);
        departments.init_schema().await.unwrap();
        DefaultSeeder::new(departments, SeedConfig::default())
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let seeder = seeder().await;

        seeder.run().await.unwrap();
        seeder.run().await.unwrap();

        let departments = seeder.departments.list().await.unwrap();
        assert_eq!(departments.len(), 1);
        assert_eq!(departments[0].name, "General");
        assert_eq!(departments[0].slug, "general");
    }
}
