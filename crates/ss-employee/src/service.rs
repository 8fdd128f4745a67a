//! Employee and department services.
//!
//! Employee mutations that affect the login (create, email/password/role
//! change, delete) stage user lifecycle events in the outbox inside the
//! mutation's transaction. Departments are purely local, no sync.

use chrono::Utc;
use tracing::info;

use ss_bus::topic;
use ss_common::merge::MergePatch;
use ss_common::token::Claims;
use ss_common::{EventKind, NewOutboxItem, Role, StaffSyncError, UserLifecycleEvent};
use ss_outbox::sqlite::SqliteOutboxRepository;

use crate::access::{authorize_employee_read, AccessTarget, Requester};
use crate::domain::{
    CreateDepartmentRequest, CreateEmployeeRequest, DepartmentPatch, DepartmentRecord,
    EmployeePatch, EmployeeRecord, STATUS_ACTIVE,
};
use crate::repository::{DepartmentStore, EmployeeStore};

pub struct EmployeeService {
    employees: EmployeeStore,
    departments: DepartmentStore,
}

impl EmployeeService {
    pub fn new(employees: EmployeeStore, departments: DepartmentStore) -> Self {
        Self {
            employees,
            departments,
        }
    }

    pub fn store(&self) -> &EmployeeStore {
        &self.employees
    }

    /// Resolve the caller's own employee record (by token subject) into an
    /// access-control requester. Admins typically have no employee record.
    pub async fn resolve_requester(&self, claims: &Claims) -> Result<Requester, StaffSyncError> {
        let own = self.employees.find_by_email(&claims.sub).await?;
        Ok(Requester {
            role: claims.role,
            user_id: own.as_ref().map(|e| e.user_id),
            department_id: own.as_ref().and_then(|e| e.department_id),
        })
    }

    async fn check_department(&self, department_id: Option<i64>) -> Result<(), StaffSyncError> {
        if let Some(id) = department_id {
            if self.departments.find_by_id(id).await?.is_none() {
                return Err(StaffSyncError::not_found("Department", id));
            }
        }
        Ok(())
    }

    /// Create an employee and stage the CREATE event that provisions the
    /// matching login on the auth side.
    pub async fn create_employee(
        &self,
        req: CreateEmployeeRequest,
    ) -> Result<EmployeeRecord, StaffSyncError> {
        req.validate()?;

        if self.employees.exists_by_user_id(req.user_id).await? {
            return Err(StaffSyncError::conflict(
                "Employee",
                "userId",
                req.user_id.to_string(),
            ));
        }
        if self.employees.exists_by_email(&req.email).await? {
            return Err(StaffSyncError::conflict("Employee", "email", &req.email));
        }
        self.check_department(req.department_id).await?;

        let now = Utc::now();
        let mut record = EmployeeRecord {
            id: 0,
            user_id: req.user_id,
            employee_id: req
                .employee_id
                .clone()
                .unwrap_or_else(|| format!("EMP-{}", req.user_id)),
            email: req.email.clone(),
            first_name: req.first_name.clone(),
            last_name: req.last_name.clone(),
            status: req.status.clone().unwrap_or_else(|| STATUS_ACTIVE.to_string()),
            department_id: req.department_id,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.employees.pool().begin().await?;
        record.id = EmployeeStore::insert(&mut tx, &record).await?;

        let event = UserLifecycleEvent::created(
            req.user_id,
            req.email.clone(),
            req.password.clone(),
            req.role(),
        );
        let item = NewOutboxItem::for_event(topic::topic_for(EventKind::Create), &event)?;
        SqliteOutboxRepository::enqueue(&mut tx, &item).await?;
        tx.commit().await?;

        info!(employee_id = record.id, user_id = record.user_id, "Employee created");
        Ok(record)
    }

    pub async fn get_employee(
        &self,
        id: i64,
        claims: &Claims,
    ) -> Result<EmployeeRecord, StaffSyncError> {
        let employee = self
            .employees
            .find_by_id(id)
            .await?
            .ok_or_else(|| StaffSyncError::not_found("Employee", id))?;

        let requester = self.resolve_requester(claims).await?;
        authorize_employee_read(
            &requester,
            &AccessTarget {
                owner_user_id: Some(employee.user_id),
                department_id: employee.department_id,
            },
        )?;
        Ok(employee)
    }

    pub async fn list_employees(&self) -> Result<Vec<EmployeeRecord>, StaffSyncError> {
        self.employees.list().await
    }

    pub async fn list_by_department(
        &self,
        department_id: i64,
        claims: &Claims,
    ) -> Result<Vec<EmployeeRecord>, StaffSyncError> {
        if self.departments.find_by_id(department_id).await?.is_none() {
            return Err(StaffSyncError::not_found("Department", department_id));
        }

        let requester = self.resolve_requester(claims).await?;
        authorize_employee_read(
            &requester,
            &AccessTarget {
                owner_user_id: None,
                department_id: Some(department_id),
            },
        )?;

        self.employees.list_by_department(department_id).await
    }

    /// Apply a sparse update. Login-affecting fields (email change, password,
    /// role) ride to the auth service in an UPDATE event.
    pub async fn update_employee(
        &self,
        id: i64,
        patch: EmployeePatch,
    ) -> Result<EmployeeRecord, StaffSyncError> {
        let mut tx = self.employees.pool().begin().await?;

        let mut employee = EmployeeStore::find_by_id_in(&mut tx, id)
            .await?
            .ok_or_else(|| StaffSyncError::not_found("Employee", id))?;

        if let Some(new_email) = &patch.email {
            if new_email != &employee.email && self.employees.exists_by_email(new_email).await? {
                return Err(StaffSyncError::conflict("Employee", "email", new_email));
            }
        }
        if patch.department_id != employee.department_id {
            self.check_department(patch.department_id).await?;
        }

        let email_before = employee.email.clone();
        let changed = patch.apply_to(&mut employee);
        if changed {
            employee.updated_at = Utc::now();
            EmployeeStore::update(&mut tx, &employee).await?;
        }

        let email_changed = employee.email != email_before;
        if email_changed || patch.password.is_some() || patch.role.is_some() {
            let event = UserLifecycleEvent {
                id: employee.user_id,
                email: email_changed.then(|| employee.email.clone()),
                password: patch.password.clone(),
                role: patch.role,
                kind: EventKind::Update,
            };
            let item = NewOutboxItem::for_event(topic::topic_for(EventKind::Update), &event)?;
            SqliteOutboxRepository::enqueue(&mut tx, &item).await?;
        }
        tx.commit().await?;

        info!(employee_id = id, "Employee updated");
        Ok(employee)
    }

    /// Loud delete on the API path; the DELETE event removes the login.
    pub async fn delete_employee(&self, id: i64) -> Result<(), StaffSyncError> {
        let mut tx = self.employees.pool().begin().await?;

        let employee = EmployeeStore::find_by_id_in(&mut tx, id)
            .await?
            .ok_or_else(|| StaffSyncError::not_found("Employee", id))?;
        EmployeeStore::delete(&mut tx, id).await?;

        let event = UserLifecycleEvent::deleted(employee.user_id);
        let item = NewOutboxItem::for_event(topic::topic_for(EventKind::Delete), &event)?;
        SqliteOutboxRepository::enqueue(&mut tx, &item).await?;
        tx.commit().await?;

        info!(employee_id = id, user_id = employee.user_id, "Employee deleted");
        Ok(())
    }
}

pub struct DepartmentService {
    departments: DepartmentStore,
}

impl DepartmentService {
    pub fn new(departments: DepartmentStore) -> Self {
        Self { departments }
    }

    pub fn store(&self) -> &DepartmentStore {
        &self.departments
    }

    pub async fn create_department(
        &self,
        req: CreateDepartmentRequest,
    ) -> Result<DepartmentRecord, StaffSyncError> {
        req.validate()?;

        if self.departments.exists_by_name(&req.name).await? {
            return Err(StaffSyncError::conflict("Department", "name", &req.name));
        }

        let now = Utc::now();
        let mut record = DepartmentRecord {
            id: 0,
            slug: req.name.to_lowercase(),
            name: req.name,
            description: req.description,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.departments.pool().begin().await?;
        record.id = DepartmentStore::insert(&mut tx, &record).await?;
        tx.commit().await?;

        info!(department_id = record.id, "Department created");
        Ok(record)
    }

    pub async fn get_department(&self, id: i64) -> Result<DepartmentRecord, StaffSyncError> {
        self.departments
            .find_by_id(id)
            .await?
            .ok_or_else(|| StaffSyncError::not_found("Department", id))
    }

    pub async fn list_departments(&self) -> Result<Vec<DepartmentRecord>, StaffSyncError> {
        self.departments.list().await
    }

    pub async fn update_department(
        &self,
        id: i64,
        patch: DepartmentPatch,
    ) -> Result<DepartmentRecord, StaffSyncError> {
        let mut tx = self.departments.pool().begin().await?;

        let mut department = DepartmentStore::find_by_id_in(&mut tx, id)
            .await?
            .ok_or_else(|| StaffSyncError::not_found("Department", id))?;

        if let Some(new_name) = &patch.name {
            if new_name != &department.name && self.departments.exists_by_name(new_name).await? {
                return Err(StaffSyncError::conflict("Department", "name", new_name));
            }
        }

        if patch.apply_to(&mut department) {
            department.updated_at = Utc::now();
            DepartmentStore::update(&mut tx, &department).await?;
            tx.commit().await?;
        }

        Ok(department)
    }

    pub async fn delete_department(&self, id: i64) -> Result<(), StaffSyncError> {
        let mut tx = self.departments.pool().begin().await?;
        let deleted = DepartmentStore::delete(&mut tx, id).await?;
        if deleted == 0 {
            return Err(StaffSyncError::not_found("Department", id));
        }
        tx.commit().await?;

        info!(department_id = id, "Department deleted");
        Ok(())
    }
}
