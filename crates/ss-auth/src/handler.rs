//! Consumes user lifecycle events originated by the employee service.
//!
//! Handlers apply the event to the local user store and nothing else: they
//! never stage outbox rows, so an event can't ping-pong between the services.
//! All three operations are idempotent under redelivery.

use async_trait::async_trait;
use tracing::{debug, info};

use ss_bus::EventHandler;
use ss_common::event::is_password_hash;
use ss_common::{EventKind, StaffSyncError, UserLifecycleEvent};

use crate::domain::UserRecord;
use crate::password::PasswordService;
use crate::repository::UserStore;

pub struct AuthEventHandler {
    store: UserStore,
    passwords: PasswordService,
}

impl AuthEventHandler {
    pub fn new(store: UserStore, passwords: PasswordService) -> Self {
        Self { store, passwords }
    }

    /// Password values on the wire are either argon2 hashes (auth-originated)
    /// or plaintext (employee-originated admin creation). Plaintext is hashed
    /// before storage; hashes pass through untouched.
    fn storable_hash(&self, password: &str) -> Result<String, StaffSyncError> {
        if is_password_hash(password) {
            Ok(password.to_string())
        } else {
            self.passwords.hash(password)
        }
    }

    async fn apply_create(&self, event: &UserLifecycleEvent) -> Result<(), StaffSyncError> {
        let email = event
            .email
            .as_deref()
            .ok_or_else(|| StaffSyncError::malformed_event("CREATE event without email"))?;
        let password = event
            .password
            .as_deref()
            .ok_or_else(|| StaffSyncError::malformed_event("CREATE event without password"))?;
        let role = event
            .role
            .ok_or_else(|| StaffSyncError::malformed_event("CREATE event without role"))?;

        if self.store.exists_by_email(email).await? {
            debug!(user_id = event.id, "CREATE already applied, skipping");
            return Ok(());
        }

        let record = UserRecord {
            id: event.id,
            email: email.to_string(),
            password_hash: self.storable_hash(password)?,
            role,
        };

        let mut tx = self.store.pool().begin().await?;
        UserStore::insert_with_id(&mut tx, &record).await?;
        tx.commit().await?;

        info!(user_id = event.id, "User created from event");
        Ok(())
    }

    async fn apply_update(&self, event: &UserLifecycleEvent) -> Result<(), StaffSyncError> {
        let mut tx = self.store.pool().begin().await?;

        let Some(mut user) = UserStore::find_by_id_in(&mut tx, event.id).await? else {
            drop(tx);
            // Missed CREATE; synthesize the record from the update when it
            // carries enough fields, otherwise the event is unprocessable.
            if event.email.is_some() && event.password.is_some() && event.role.is_some() {
                info!(user_id = event.id, "UPDATE for unknown user, creating");
                return self.apply_create(event).await;
            }
            return Err(StaffSyncError::malformed_event(format!(
                "UPDATE for unknown user {} without enough fields to create",
                event.id
            )));
        };

        if let Some(email) = &event.email {
            user.email = email.clone();
        }
        if let Some(role) = event.role {
            user.role = role;
        }
        if let Some(password) = &event.password {
            user.password_hash = self.storable_hash(password)?;
        }

        UserStore::update(&mut tx, &user).await?;
        tx.commit().await?;

        info!(user_id = event.id, "User updated from event");
        Ok(())
    }

    async fn apply_delete(&self, event: &UserLifecycleEvent) -> Result<(), StaffSyncError> {
        let mut tx = self.store.pool().begin().await?;
        let deleted = UserStore::delete(&mut tx, event.id).await?;
        tx.commit().await?;

        if deleted == 0 {
            debug!(user_id = event.id, "DELETE for absent user, nothing to do");
        } else {
            info!(user_id = event.id, "User deleted from event");
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for AuthEventHandler {
    async fn handle(&self, event: UserLifecycleEvent) -> Result<(), StaffSyncError> {
        match event.kind {
            EventKind::Create => self.apply_create(&event).await,
            EventKind::Update => self.apply_update(&event).await,
            EventKind::Delete => self.apply_delete(&event).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;
    use ss_common::Role;

    async fn handler() -> (AuthEventHandler, SqlitePool) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = UserStore::new(pool.clone());
        store.init_schema().await.unwrap();
        (
            AuthEventHandler::new(store, PasswordService::new()),
            pool,
        )
    }

    fn create_event(id: i64, email: &str, password: &str) -> UserLifecycleEvent {
        UserLifecycleEvent::created(id, email.to_string(), password.to_string(), Role::Employee)
    }

    #[tokio::test]
    async fn duplicate_create_leaves_one_record() {
        let (handler, _pool) = handler().await;
        let event = create_event(5, "e@staffsync.io", "plaintext-pw");

        handler.handle(event.clone()).await.unwrap();
        handler.handle(event).await.unwrap();

        let users = handler.store.list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, 5);
        // plaintext from the wire never lands in the store
        assert!(users[0].password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn update_for_unknown_user_creates_it() {
        let (handler, _pool) = handler().await;
        let mut event = create_event(9, "m@staffsync.io", "plaintext-pw");
        event.kind = EventKind::Update;
        event.role = Some(Role::Manager);

        handler.handle(event).await.unwrap();

        let user = handler.store.find_by_id(9).await.unwrap().unwrap();
        assert_eq!(user.role, Role::Manager);
    }

    #[tokio::test]
    async fn sparse_update_touches_only_present_fields() {
        let (handler, _pool) = handler().await;
        handler
            .handle(create_event(3, "c@staffsync.io", "plaintext-pw"))
            .await
            .unwrap();
        let hash_before = handler.store.find_by_id(3).await.unwrap().unwrap().password_hash;

        handler
            .handle(UserLifecycleEvent {
                id: 3,
                email: Some("renamed@staffsync.io".to_string()),
                password: None,
                role: None,
                kind: EventKind::Update,
            })
            .await
            .unwrap();

        let user = handler.store.find_by_id(3).await.unwrap().unwrap();
        assert_eq!(user.email, "renamed@staffsync.io");
        assert_eq!(user.role, Role::Employee);
        assert_eq!(user.password_hash, hash_before);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (handler, _pool) = handler().await;
        handler
            .handle(create_event(4, "d@staffsync.io", "plaintext-pw"))
            .await
            .unwrap();

        let delete = UserLifecycleEvent::deleted(4);
        handler.handle(delete.clone()).await.unwrap();
        handler.handle(delete).await.unwrap();

        assert!(handler.store.find_by_id(4).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_without_email_is_terminal() {
        let (handler, _pool) = handler().await;
        let event = UserLifecycleEvent {
            id: 8,
            email: None,
            password: Some("pw".to_string()),
            role: Some(Role::Employee),
            kind: EventKind::Create,
        };

        let err = handler.handle(event).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
