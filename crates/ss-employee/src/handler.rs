//! Consumes user lifecycle events originated by the auth service.
//!
//! Creates, updates and deletes employee rows to track the user store. Never
//! stages outbox rows, so events can't loop between the services. ADMIN
//! events are filtered out: admins have logins but no employee record.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use ss_bus::EventHandler;
use ss_common::{EventKind, StaffSyncError, UserLifecycleEvent};

use crate::domain::{EmployeeRecord, STATUS_ACTIVE};
use crate::repository::EmployeeStore;

pub struct EmployeeEventHandler {
    store: EmployeeStore,
}

impl EmployeeEventHandler {
    pub fn new(store: EmployeeStore) -> Self {
        Self { store }
    }

    async fn apply_create(&self, event: &UserLifecycleEvent) -> Result<(), StaffSyncError> {
        if matches!(event.role, Some(role) if !role.has_employee_record()) {
            debug!(user_id = event.id, "ADMIN user, no employee record");
            return Ok(());
        }
        let email = event
            .email
            .as_deref()
            .ok_or_else(|| StaffSyncError::malformed_event("CREATE event without email"))?;

        if self.store.exists_by_user_id(event.id).await? {
            debug!(user_id = event.id, "CREATE already applied, skipping");
            return Ok(());
        }

        // Signup carries no profile fields; the record starts minimal and is
        // filled in through the employee API later.
        let now = Utc::now();
        let record = EmployeeRecord {
            id: 0,
            user_id: event.id,
            employee_id: format!("EMP-{}", event.id),
            email: email.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            status: STATUS_ACTIVE.to_string(),
            department_id: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.pool().begin().await?;
        EmployeeStore::insert(&mut tx, &record).await?;
        tx.commit().await?;

        info!(user_id = event.id, "Employee created from event");
        Ok(())
    }

    async fn apply_update(&self, event: &UserLifecycleEvent) -> Result<(), StaffSyncError> {
        let Some(mut employee) = self.store.find_by_user_id(event.id).await? else {
            // Missed CREATE (or the user was an admin until now); synthesize
            // the record when the event carries an email.
            if matches!(event.role, Some(role) if !role.has_employee_record()) {
                return Ok(());
            }
            if event.email.is_some() {
                info!(user_id = event.id, "UPDATE for unknown employee, creating");
                return self.apply_create(event).await;
            }
            debug!(user_id = event.id, "UPDATE with no employee-visible fields, skipping");
            return Ok(());
        };

        // Only the email is shared state; password and role live in the user
        // store.
        let Some(email) = &event.email else {
            return Ok(());
        };
        if *email == employee.email {
            return Ok(());
        }

        employee.email = email.clone();
        employee.updated_at = Utc::now();

        let mut tx = self.store.pool().begin().await?;
        EmployeeStore::update(&mut tx, &employee).await?;
        tx.commit().await?;

        info!(user_id = event.id, "Employee updated from event");
        Ok(())
    }

    async fn apply_delete(&self, event: &UserLifecycleEvent) -> Result<(), StaffSyncError> {
        let mut tx = self.store.pool().begin().await?;
        let deleted = EmployeeStore::delete_by_user_id(&mut tx, event.id).await?;
        tx.commit().await?;

        if deleted == 0 {
            debug!(user_id = event.id, "DELETE for absent employee, nothing to do");
        } else {
            info!(user_id = event.id, "Employee deleted from event");
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for EmployeeEventHandler {
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
    use ss_common::Role;

    async fn handler() -> EmployeeEventHandler {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = EmployeeStore::new(pool);
        store.init_schema().await.unwrap();
        EmployeeEventHandler::new(store)
    }

    fn create_event(id: i64, email: &str, role: Role) -> UserLifecycleEvent {
        UserLifecycleEvent::created(id, email.to_string(), "$argon2id$stub".to_string(), role)
    }

    #[tokio::test]
    async fn duplicate_create_leaves_one_record() {
        let handler = handler().await;
        let event = create_event(7, "e@staffsync.io", Role::Employee);

        handler.handle(event.clone()).await.unwrap();
        handler.handle(event).await.unwrap();

        let all = handler.store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].user_id, 7);
        assert_eq!(all[0].employee_id, "EMP-7");
        assert_eq!(all[0].status, STATUS_ACTIVE);
    }

    #[tokio::test]
    async fn admin_creates_are_filtered() {
        let handler = handler().await;
        handler
            .handle(create_event(1, "root@staffsync.io", Role::Admin))
            .await
            .unwrap();
        assert!(handler.store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_for_unknown_user_creates_the_record() {
        let handler = handler().await;
        let event = UserLifecycleEvent {
            id: 9,
            email: Some("m@staffsync.io".to_string()),
            password: None,
            role: Some(Role::Manager),
            kind: EventKind::Update,
        };

        handler.handle(event).await.unwrap();

        let employee = handler.store.find_by_user_id(9).await.unwrap().unwrap();
        assert_eq!(employee.email, "m@staffsync.io");
    }

    #[tokio::test]
    async fn update_applies_the_email_and_nothing_else() {
        let handler = handler().await;
        handler
            .handle(create_event(3, "c@staffsync.io", Role::Employee))
            .await
            .unwrap();

        handler
            .handle(UserLifecycleEvent {
                id: 3,
                email: Some("renamed@staffsync.io".to_string()),
                password: Some("$argon2id$new".to_string()),
                role: None,
                kind: EventKind::Update,
            })
            .await
            .unwrap();

        let employee = handler.store.find_by_user_id(3).await.unwrap().unwrap();
        assert_eq!(employee.email, "renamed@staffsync.io");
        assert_eq!(employee.employee_id, "EMP-3");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let handler = handler().await;
        handler
            .handle(create_event(4, "d@staffsync.io", Role::Employee))
            .await
            .unwrap();

        let delete = UserLifecycleEvent::deleted(4);
        handler.handle(delete.clone()).await.unwrap();
        handler.handle(delete).await.unwrap();

        assert!(handler.store.find_by_user_id(4).await.unwrap().is_none());
    }
}
