//! User domain types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use ss_common::merge::{merge_field, MergePatch};
use ss_common::{Role, StaffSyncError};

/// Persisted identity record. The password hash never leaves this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// API-facing view of a user, with the credential stripped.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

impl From<&UserRecord> for UserResponse {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email.clone(),
            role: record.role,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), StaffSyncError> {
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(StaffSyncError::validation("A valid email is required"));
        }
        if self.password.len() < 8 {
            return Err(StaffSyncError::validation(
                "Password must be at least 8 characters",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Sparse update for a user. `password`, when present, arrives in plaintext
/// and is hashed before it touches the record, so [`MergePatch::apply_to`]
/// covers only the directly-mergeable fields.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserPatch {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

impl MergePatch<UserRecord> for UserPatch {
    fn apply_to(&self, target: &mut UserRecord) -> bool {
        let mut changed = merge_field(&self.email, &mut target.email);
        changed |= merge_field(&self.role, &mut target.role);
        changed
    }

    fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none() && self.role.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> UserRecord {
        UserRecord {
            id: 1,
            email: "a@staffsync.io".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role: Role::Employee,
        }
    }

    #[test]
    fn patch_leaves_absent_fields_untouched() {
        let mut user = record();
        let patch = UserPatch {
            role: Some(Role::Manager),
            ..Default::default()
        };
        assert!(patch.apply_to(&mut user));
        assert_eq!(user.role, Role::Manager);
        assert_eq!(user.email, "a@staffsync.io");
    }

    #[test]
    fn empty_patch_is_a_no_op() {
        let mut user = record();
        let patch = UserPatch::default();
        assert!(patch.is_empty());
        assert!(!patch.apply_to(&mut user));
        assert_eq!(user, record());
    }

    #[test]
    fn signup_validation_rejects_short_passwords() {
        let req = CreateUserRequest {
            email: "a@staffsync.io".to_string(),
            password: "short".to_string(),
            role: Role::Employee,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn response_never_carries_the_hash() {
        let json = serde_json::to_string(&UserResponse::from(&record())).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }
}
