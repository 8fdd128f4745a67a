//! Employee read access decision.
//!
//! Evaluated first-match-wins:
//! 1. ADMIN sees everything.
//! 2. A MANAGER sees employees of their own department.
//! 3. Anyone sees their own record.
//! 4. Otherwise: denied.
//!
//! The same rule guards single-employee fetches and department listings; a
//! listing target has no owner, so rule 3 never matches there.

use ss_common::{Role, StaffSyncError};

/// Who is asking. `user_id`/`department_id` come from the requester's own
/// employee record and are `None` when no such record exists (e.g. admins).
#[derive(Debug, Clone, Copy)]
pub struct Requester {
    pub role: Role,
    pub user_id: Option<i64>,
    pub department_id: Option<i64>,
}

/// What is being read.
#[derive(Debug, Clone, Copy)]
pub struct AccessTarget {
    pub owner_user_id: Option<i64>,
    pub department_id: Option<i64>,
}

pub fn authorize_employee_read(
    requester: &Requester,
    target: &AccessTarget,
) -> Result<(), StaffSyncError> {
    if requester.role == Role::Admin {
        return Ok(());
    }

    if requester.role == Role::Manager
        && requester.department_id.is_some()
        && requester.department_id == target.department_id
    {
        return Ok(());
    }

    if requester.user_id.is_some() && requester.user_id == target.owner_user_id {
        return Ok(());
    }

    Err(StaffSyncError::access_denied(
        "Not allowed to view this employee data",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requester(role: Role, user_id: Option<i64>, department_id: Option<i64>) -> Requester {
        Requester {
            role,
            user_id,
            department_id,
        }
    }

    const TARGET: AccessTarget = AccessTarget {
        owner_user_id: Some(10),
        department_id: Some(2),
    };

    #[test]
    fn admin_always_allowed() {
        let admin = requester(Role::Admin, None, None);
        assert!(authorize_employee_read(&admin, &TARGET).is_ok());
    }

    #[test]
    fn manager_allowed_only_in_own_department() {
        let same = requester(Role::Manager, Some(20), Some(2));
        let other = requester(Role::Manager, Some(20), Some(3));
        assert!(authorize_employee_read(&same, &TARGET).is_ok());
        assert!(authorize_employee_read(&other, &TARGET).is_err());
    }

    #[test]
    fn self_access_allowed() {
        let own = requester(Role::Employee, Some(10), Some(9));
        assert!(authorize_employee_read(&own, &TARGET).is_ok());
    }

    #[test]
    fn other_employees_denied() {
        let stranger = requester(Role::Employee, Some(11), Some(2));
        assert!(authorize_employee_read(&stranger, &TARGET).is_err());
    }

    #[test]
    fn missing_departments_never_match() {
        // Manager whose own record has no department must not match a target
        // that also has none.
        let manager = requester(Role::Manager, Some(20), None);
        let target = AccessTarget {
            owner_user_id: Some(10),
            department_id: None,
        };
        assert!(authorize_employee_read(&manager, &target).is_err());
    }

    #[test]
    fn listing_target_has_no_owner_so_self_rule_never_fires() {
        let listing = AccessTarget {
            owner_user_id: None,
            department_id: Some(2),
        };
        let employee = requester(Role::Employee, Some(10), Some(2));
        assert!(authorize_employee_read(&employee, &listing).is_err());
        let manager = requester(Role::Manager, Some(10), Some(2));
        assert!(authorize_employee_read(&manager, &listing).is_ok());
    }
}
