//! Authentication service: user CRUD, login, and event emission.
//!
//! Every mutation that other services must observe writes its lifecycle event
//! into the outbox inside the mutation's own transaction. There is no direct
//! bus publish on this path.

use std::sync::Arc;
use tracing::info;

use ss_bus::topic;
use ss_common::merge::MergePatch;
use ss_common::token::TokenService;
use ss_common::{EventKind, NewOutboxItem, StaffSyncError, UserLifecycleEvent};
use ss_outbox::sqlite::SqliteOutboxRepository;

use crate::domain::{CreateUserRequest, LoginRequest, UserPatch, UserResponse};
use crate::password::PasswordService;
use crate::repository::UserStore;

#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub user: UserResponse,
}

pub struct AuthService {
    store: UserStore,
    passwords: PasswordService,
    tokens: Arc<TokenService>,
}

impl AuthService {
    pub fn new(store: UserStore, passwords: PasswordService, tokens: Arc<TokenService>) -> Self {
        Self {
            store,
            passwords,
            tokens,
        }
    }

    pub fn store(&self) -> &UserStore {
        &self.store
    }

    pub fn tokens(&self) -> Arc<TokenService> {
        self.tokens.clone()
    }

    /// Register a user and stage the CREATE event. The insert and the outbox
    /// row commit together.
    pub async fn create_user(&self, req: CreateUserRequest) -> Result<UserResponse, StaffSyncError> {
        req.validate()?;

        if self.store.exists_by_email(&req.email).await? {
            return Err(StaffSyncError::conflict("User", "email", &req.email));
        }

        let password_hash = self.passwords.hash(&req.password)?;

        let mut tx = self.store.pool().begin().await?;
        let id = UserStore::insert(&mut tx, &req.email, &password_hash, req.role).await?;

        let event = UserLifecycleEvent::created(id, req.email.clone(), password_hash.clone(), req.role);
        let item = NewOutboxItem::for_event(topic::topic_for(EventKind::Create), &event)?;
        SqliteOutboxRepository::enqueue(&mut tx, &item).await?;
        tx.commit().await?;

        info!(user_id = id, "User registered");
        Ok(UserResponse {
            id,
            email: req.email,
            role: req.role,
        })
    }

    /// Credential check. Unknown email and wrong password produce the same
    /// error so login failures don't leak which emails exist.
    pub async fn login(&self, req: LoginRequest) -> Result<LoginOutcome, StaffSyncError> {
        let invalid = || StaffSyncError::auth("Invalid email or password");

        let user = self.store.find_by_email(&req.email).await?.ok_or_else(invalid)?;
        if !self.passwords.verify(&req.password, &user.password_hash) {
            return Err(invalid());
        }

        let token = self.tokens.issue(&user.email, user.role)?;
        Ok(LoginOutcome {
            token,
            user: UserResponse::from(&user),
        })
    }

    pub async fn find_user(&self, id: i64) -> Result<UserResponse, StaffSyncError> {
        let user = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| StaffSyncError::not_found("User", id))?;
        Ok(UserResponse::from(&user))
    }

    pub async fn list_users(&self) -> Result<Vec<UserResponse>, StaffSyncError> {
        let users = self.store.list().await?;
        Ok(users.iter().map(UserResponse::from).collect())
    }

    /// Apply a sparse update. Only fields that actually changed are carried
    /// in the UPDATE event; an effect-free patch emits nothing.
    pub async fn update_user(&self, id: i64, patch: UserPatch) -> Result<UserResponse, StaffSyncError> {
        let mut tx = self.store.pool().begin().await?;

        let mut user = UserStore::find_by_id_in(&mut tx, id)
            .await?
            .ok_or_else(|| StaffSyncError::not_found("User", id))?;

        if let Some(new_email) = &patch.email {
            if new_email != &user.email && self.store.exists_by_email(new_email).await? {
                return Err(StaffSyncError::conflict("User", "email", new_email));
            }
        }

        let email_before = user.email.clone();
        let role_before = user.role;
        let mut changed = patch.apply_to(&mut user);

        let new_hash = match &patch.password {
            Some(plaintext) => {
                let hash = self.passwords.hash(plaintext)?;
                user.password_hash = hash.clone();
                changed = true;
                Some(hash)
            }
            None => None,
        };

        if !changed {
            return Ok(UserResponse::from(&user));
        }

        UserStore::update(&mut tx, &user).await?;

        let event = UserLifecycleEvent {
            id,
            email: (user.email != email_before).then(|| user.email.clone()),
            password: new_hash,
            role: (user.role != role_before).then_some(user.role),
            kind: EventKind::Update,
        };
        let item = NewOutboxItem::for_event(topic::topic_for(EventKind::Update), &event)?;
        SqliteOutboxRepository::enqueue(&mut tx, &item).await?;
        tx.commit().await?;

        info!(user_id = id, "User updated");
        Ok(UserResponse::from(&user))
    }

    /// API-path delete is loud: deleting a user that does not exist is a 404.
    /// (The event-consumption path treats absence as success instead.)
    pub async fn delete_user(&self, id: i64) -> Result<(), StaffSyncError> {
        let mut tx = self.store.pool().begin().await?;

        let deleted = UserStore::delete(&mut tx, id).await?;
        if deleted == 0 {
            return Err(StaffSyncError::not_found("User", id));
        }

        let event = UserLifecycleEvent::deleted(id);
        let item = NewOutboxItem::for_event(topic::topic_for(EventKind::Delete), &event)?;
        SqliteOutboxRepository::enqueue(&mut tx, &item).await?;
        tx.commit().await?;

        info!(user_id = id, "User deleted");
        Ok(())
    }

}
