//! StaffSync employee service library.
//!
//! Owns the employee and department stores. Employee mutations that affect
//! the login stage lifecycle events in the transactional outbox; the bus
//! consumer handler applies auth-originated events to the local store.

pub mod access;
pub mod api;
pub mod domain;
pub mod handler;
pub mod repository;
pub mod seed;
pub mod service;

pub use access::{authorize_employee_read, AccessTarget, Requester};
pub use api::{router, AppState, EmployeeApiDoc};
pub use domain::{
    CreateDepartmentRequest, CreateEmployeeRequest, DepartmentPatch, DepartmentRecord,
    EmployeePatch, EmployeeRecord,
};
pub use handler::EmployeeEventHandler;
pub use repository::{DepartmentStore, EmployeeStore};
pub use seed::{DefaultSeeder, SeedConfig};
pub use service::{DepartmentService, EmployeeService};
