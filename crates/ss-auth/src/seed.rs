//! First-run seeding.
//!
//! Creates the bootstrap ADMIN login when no user carries its email yet. The
//! id is assigned by the user store like any signup, so it cannot collide
//! with an already-registered user. ADMIN users have no employee record, so
//! the staged CREATE event is filtered out on the employee side.

use std::sync::Arc;
use tracing::{info, warn};

use ss_common::{Role, StaffSyncError};

use crate::domain::CreateUserRequest;
use crate::service::AuthService;

#[derive(Debug, Clone)]
pub struct AdminSeedConfig {
    pub email: String,
    pub password: String,
}

impl Default for AdminSeedConfig {
    fn default() -> Self {
        Self {
            email: "admin@staffsync.io".to_string(),
            password: "ChangeMe123!".to_string(),
        }
    }
}

pub struct AdminSeeder {
    auth: Arc<AuthService>,
    config: AdminSeedConfig,
}

impl AdminSeeder {
    pub fn new(auth: Arc<AuthService>, config: AdminSeedConfig) -> Self {
        Self { auth, config }
    }

    /// Re-running against a store that already has the admin is a no-op.
    pub async fn run(&self) -> Result<(), StaffSyncError> {
        if self.auth.store().exists_by_email(&self.config.email).await? {
            return Ok(());
        }

        warn!(
            email = %self.config.email,
            "Seeding bootstrap admin; change its password after first login"
        );

        let created = self
            .auth
            .create_user(CreateUserRequest {
                email: self.config.email.clone(),
                password: self.config.password.clone(),
                role: Role::Admin,
            })
            .await?;

        info!(user_id = created.id, "Seeded bootstrap admin login");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use ss_common::TokenService;
    use ss_outbox::sqlite::SqliteOutboxRepository;

    use crate::domain::LoginRequest;
    use crate::password::PasswordService;
    use crate::repository::UserStore;

    async fn seeder() -> (AdminSeeder, Arc<AuthService>) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = UserStore::new(pool.clone());
        store.init_schema().await.unwrap();
        SqliteOutboxRepository::new(pool.clone())
            .init_schema()
            .await
            .unwrap();

        let auth = Arc::new(AuthService::new(
            store,
            PasswordService::new(),
            Arc::new(TokenService::new("test-secret")),
        ));
        (AdminSeeder::new(auth.clone(), AdminSeedConfig::default()), auth)
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let (seeder, auth) = seeder().await;

        seeder.run().await.unwrap();
        seeder.run().await.unwrap();

        let users = auth.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "admin@staffsync.io");
        assert_eq!(users[0].role, Role::Admin);
    }

    #[tokio::test]
    async fn seeded_admin_gets_a_fresh_id_after_signups() {
        let (seeder, auth) = seeder().await;

        // An employee signs up before first seeding and takes id 1.
        let first = auth
            .create_user(CreateUserRequest {
                email: "early@staffsync.io".to_string(),
                password: "correct-horse".to_string(),
                role: Role::Employee,
            })
            .await
            .unwrap();

        seeder.run().await.unwrap();

        let admin = auth
            .store()
            .find_by_email("admin@staffsync.io")
            .await
            .unwrap()
            .expect("admin login must exist");
        assert_ne!(admin.id, first.id);
        assert_eq!(admin.role, Role::Admin);

        // The seeded credentials actually work.
        let outcome = auth
            .login(LoginRequest {
                email: "admin@staffsync.io".to_string(),
                password: "ChangeMe123!".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.user.role, Role::Admin);
    }
}
