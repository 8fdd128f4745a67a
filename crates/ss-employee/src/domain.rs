//! Employee and department domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use ss_common::merge::{merge_field, merge_optional_field, MergePatch};
use ss_common::{Role, StaffSyncError};

pub const STATUS_ACTIVE: &str = "ACTIVE";

/// Employee row. `user_id` is the logical foreign key into the auth service's
/// user store; the two services share it through lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    pub id: i64,
    pub user_id: i64,
    /// Human-readable employee code, e.g. `EMP-42`.
    pub employee_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
    pub department_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRecord {
    pub id: i64,
    pub name: String,
    /// Lowercased name, assigned at creation.
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin-side employee creation. Also provisions the login: the user id is
/// chosen by the caller and a CREATE event carries the plaintext password to
/// the auth service, which hashes it on arrival.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployeeRequest {
    pub user_id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub department_id: Option<i64>,
}

impl CreateEmployeeRequest {
    pub fn validate(&self) -> Result<(), StaffSyncError> {
        if self.user_id <= 0 {
            return Err(StaffSyncError::validation("userId must be positive"));
        }
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(StaffSyncError::validation("A valid email is required"));
        }
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(StaffSyncError::validation("First and last name are required"));
        }
        if self.password.len() < 8 {
            return Err(StaffSyncError::validation(
                "Password must be at least 8 characters",
            ));
        }
        if matches!(self.role, Some(Role::Admin)) {
            return Err(StaffSyncError::validation(
                "ADMIN users do not have employee records",
            ));
        }
        Ok(())
    }

    pub fn role(&self) -> Role {
        self.role.unwrap_or(Role::Employee)
    }
}

/// Sparse employee update. `password` and `role` are not employee columns;
/// when present they ride along in the UPDATE event for the auth service.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeePatch {
    pub employee_id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: Option<String>,
    pub department_id: Option<i64>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

impl MergePatch<EmployeeRecord> for EmployeePatch {
    fn apply_to(&self, target: &mut EmployeeRecord) -> bool {
        let mut changed = merge_field(&self.employee_id, &mut target.employee_id);
        changed |= merge_field(&self.email, &mut target.email);
        changed |= merge_field(&self.first_name, &mut target.first_name);
        changed |= merge_field(&self.last_name, &mut target.last_name);
        changed |= merge_field(&self.status, &mut target.status);
        changed |= merge_optional_field(&self.department_id, &mut target.department_id);
        changed
    }

    fn is_empty(&self) -> bool {
        self.employee_id.is_none()
            && self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.status.is_none()
            && self.department_id.is_none()
            && self.password.is_none()
            && self.role.is_none()
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDepartmentRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateDepartmentRequest {
    pub fn validate(&self) -> Result<(), StaffSyncError> {
        if self.name.trim().is_empty() {
            return Err(StaffSyncError::validation("Department name is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl MergePatch<DepartmentRecord> for DepartmentPatch {
    fn apply_to(&self, target: &mut DepartmentRecord) -> bool {
        let mut changed = merge_field(&self.name, &mut target.name);
        changed |= merge_optional_field(&self.description, &mut target.description);
        changed
    }

    fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}
