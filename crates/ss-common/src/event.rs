use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::StaffSyncError;

/// Role attached to an identity record and asserted in token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Manager,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Employee => "EMPLOYEE",
        }
    }

    /// Roles that own an employee record in the Employee store.
    pub fn has_employee_record(&self) -> bool {
        matches!(self, Role::Manager | Role::Employee)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StaffSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "MANAGER" => Ok(Role::Manager),
            "EMPLOYEE" => Ok(Role::Employee),
            other => Err(StaffSyncError::validation(format!("Unknown role: {other}"))),
        }
    }
}

/// Lifecycle stage carried by a [`UserLifecycleEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

/// Cross-service user lifecycle event.
///
/// Published after a local mutation commits (via the outbox) and consumed by
/// the other store. `id` is the user id and doubles as the bus partition key,
/// so events for the same user are delivered in order. Optional fields model
/// sparse updates: `None` means "not part of this change", never "set empty".
///
/// `password` carries either an argon2 hash (auth-originated events) or a
/// plaintext password (admin-originated employee creation); hashes are
/// recognizable by their `$argon2` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLifecycleEvent {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub kind: EventKind,
}

impl UserLifecycleEvent {
    /// Partition key on the bus. Stringified user id keeps per-user ordering.
    pub fn partition_key(&self) -> String {
        self.id.to_string()
    }

    pub fn created(id: i64, email: String, password: String, role: Role) -> Self {
        Self {
            id,
            email: Some(email),
            password: Some(password),
            role: Some(role),
            kind: EventKind::Create,
        }
    }

    pub fn deleted(id: i64) -> Self {
        Self {
            id,
            email: None,
            password: None,
            role: None,
            kind: EventKind::Delete,
        }
    }
}

/// True when a password value is already an argon2 hash rather than plaintext.
pub fn is_password_hash(value: &str) -> bool {
    value.starts_with("$argon2")
}
