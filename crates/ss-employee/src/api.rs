//! Employee and department API endpoints.
//!
//! Employee mutations and the full listing are ADMIN-only, the
//! per-department listing is for ADMIN and MANAGER, and single-employee
//! reads go through the access rule.

use axum::extract::{Extension, Path};
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use utoipa::OpenApi;

use ss_common::token::{require_admin, require_any_role, AuthClaims, TokenService};
use ss_common::{ApiFailure, IntoApiResult, Role, ServerResponse};

use crate::domain::{
    CreateDepartmentRequest, CreateEmployeeRequest, DepartmentPatch, DepartmentRecord,
    EmployeePatch, EmployeeRecord,
};
use crate::service::{DepartmentService, EmployeeService};

#[derive(Clone)]
pub struct AppState {
    pub employees: Arc<EmployeeService>,
    pub departments: Arc<DepartmentService>,
}

/// Create an employee (ADMIN)
#[utoipa::path(
    post,
    path = "/employees",
    tag = "employees",
    request_body = CreateEmployeeRequest,
    responses(
        (status = 201, description = "Employee created", body = EmployeeRecord),
        (status = 404, description = "No such department"),
        (status = 409, description = "userId or email already in use")
    )
)]
pub async fn create_employee(
    Extension(state): Extension<AppState>,
    AuthClaims(claims): AuthClaims,
    uri: Uri,
    Json(req): Json<CreateEmployeeRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    require_admin(&claims).at(uri.path())?;
    let employee = state.employees.create_employee(req).await.at(uri.path())?;
    Ok((
        StatusCode::CREATED,
        Json(ServerResponse::success("Employee created", employee)),
    ))
}

/// List all employees (ADMIN)
#[utoipa::path(
    get,
    path = "/employees",
    tag = "employees",
    responses(
        (status = 200, description = "All employees", body = [EmployeeRecord]),
        (status = 403, description = "Requires ADMIN role")
    )
)]
pub async fn list_employees(
    Extension(state): Extension<AppState>,
    AuthClaims(claims): AuthClaims,
    uri: Uri,
) -> Result<impl IntoResponse, ApiFailure> {
    require_admin(&claims).at(uri.path())?;
    let employees = state.employees.list_employees().await.at(uri.path())?;
    Ok(Json(ServerResponse::success("Employees retrieved", employees)))
}

/// Fetch one employee (ADMIN, own-department MANAGER, or self)
#[utoipa::path(
    get,
    path = "/employees/{id}",
    tag = "employees",
    responses(
        (status = 200, description = "Employee found", body = EmployeeRecord),
        (status = 403, description = "Access rule denied the read"),
        (status = 404, description = "No such employee")
    )
)]
pub async fn get_employee(
    Extension(state): Extension<AppState>,
    AuthClaims(claims): AuthClaims,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiFailure> {
    let employee = state.employees.get_employee(id, &claims).await.at(uri.path())?;
    Ok(Json(ServerResponse::success("Employee retrieved", employee)))
}

/// Update an employee (ADMIN)
#[utoipa::path(
    put,
    path = "/employees/{id}",
    tag = "employees",
    request_body = EmployeePatch,
    responses(
        (status = 200, description = "Employee updated", body = EmployeeRecord),
        (status = 404, description = "No such employee"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn update_employee(
    Extension(state): Extension<AppState>,
    AuthClaims(claims): AuthClaims,
    uri: Uri,
    Path(id): Path<i64>,
    Json(patch): Json<EmployeePatch>,
) -> Result<impl IntoResponse, ApiFailure> {
    require_admin(&claims).at(uri.path())?;
    let employee = state.employees.update_employee(id, patch).await.at(uri.path())?;
    Ok(Json(ServerResponse::success("Employee updated", employee)))
}

/// Delete an employee (ADMIN)
#[utoipa::path(
    delete,
    path = "/employees/{id}",
    tag = "employees",
    responses(
        (status = 200, description = "Employee deleted"),
        (status = 404, description = "No such employee")
    )
)]
pub async fn delete_employee(
    Extension(state): Extension<AppState>,
    AuthClaims(claims): AuthClaims,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiFailure> {
    require_admin(&claims).at(uri.path())?;
    state.employees.delete_employee(id).await.at(uri.path())?;
    Ok(Json(ServerResponse::<()>::message_only("Employee deleted")))
}

/// List a department's employees (ADMIN or MANAGER)
#[utoipa::path(
    get,
    path = "/employees/department/{id}",
    tag = "employees",
    responses(
        (status = 200, description = "Department employees", body = [EmployeeRecord]),
        (status = 403, description = "Not a manager of this department"),
        (status = 404, description = "No such department")
    )
)]
pub async fn list_department_employees(
    Extension(state): Extension<AppState>,
    AuthClaims(claims): AuthClaims,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiFailure> {
    require_any_role(&claims, &[Role::Admin, Role::Manager]).at(uri.path())?;
    let employees = state
        .employees
        .list_by_department(id, &claims)
        .await
        .at(uri.path())?;
    Ok(Json(ServerResponse::success("Employees retrieved", employees)))
}

/// Create a department (ADMIN)
#[utoipa::path(
    post,
    path = "/department",
    tag = "departments",
    request_body = CreateDepartmentRequest,
    responses(
        (status = 201, description = "Department created", body = DepartmentRecord),
        (status = 409, description = "Name already in use")
    )
)]
pub async fn create_department(
    Extension(state): Extension<AppState>,
    AuthClaims(claims): AuthClaims,
    uri: Uri,
    Json(req): Json<CreateDepartmentRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    require_admin(&claims).at(uri.path())?;
    let department = state.departments.create_department(req).await.at(uri.path())?;
    Ok((
        StatusCode::CREATED,
        Json(ServerResponse::success("Department created", department)),
    ))
}

/// List departments (authenticated)
#[utoipa::path(
    get,
    path = "/department",
    tag = "departments",
    responses(
        (status = 200, description = "All departments", body = [DepartmentRecord])
    )
)]
pub async fn list_departments(
    Extension(state): Extension<AppState>,
    AuthClaims(_claims): AuthClaims,
    uri: Uri,
) -> Result<impl IntoResponse, ApiFailure> {
    let departments = state.departments.list_departments().await.at(uri.path())?;
    Ok(Json(ServerResponse::success("Departments retrieved", departments)))
}

/// Fetch one department (authenticated)
#[utoipa::path(
    get,
    path = "/department/{id}",
    tag = "departments",
    responses(
        (status = 200, description = "Department found", body = DepartmentRecord),
        (status = 404, description = "No such department")
    )
)]
pub async fn get_department(
    Extension(state): Extension<AppState>,
    AuthClaims(_claims): AuthClaims,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiFailure> {
    let department = state.departments.get_department(id).await.at(uri.path())?;
    Ok(Json(ServerResponse::success("Department retrieved", department)))
}

/// Update a department (ADMIN)
#[utoipa::path(
    put,
    path = "/department/{id}",
    tag = "departments",
    request_body = DepartmentPatch,
    responses(
        (status = 200, description = "Department updated", body = DepartmentRecord),
        (status = 404, description = "No such department"),
        (status = 409, description = "Name already in use")
    )
)]
pub async fn update_department(
    Extension(state): Extension<AppState>,
    AuthClaims(claims): AuthClaims,
    uri: Uri,
    Path(id): Path<i64>,
    Json(patch): Json<DepartmentPatch>,
) -> Result<impl IntoResponse, ApiFailure> {
    require_admin(&claims).at(uri.path())?;
    let department = state
        .departments
        .update_department(id, patch)
        .await
        .at(uri.path())?;
    Ok(Json(ServerResponse::success("Department updated", department)))
}

/// Delete a department (ADMIN)
#[utoipa::path(
    delete,
    path = "/department/{id}",
    tag = "departments",
    responses(
        (status = 200, description = "Department deleted"),
        (status = 404, description = "No such department")
    )
)]
pub async fn delete_department(
    Extension(state): Extension<AppState>,
    AuthClaims(claims): AuthClaims,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiFailure> {
    require_admin(&claims).at(uri.path())?;
    state.departments.delete_department(id).await.at(uri.path())?;
    Ok(Json(ServerResponse::<()>::message_only("Department deleted")))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        create_employee,
        list_employees,
        get_employee,
        update_employee,
        delete_employee,
        list_department_employees,
        create_department,
        list_departments,
        get_department,
        update_department,
        delete_department
    ),
    components(schemas(
        CreateEmployeeRequest,
        EmployeePatch,
        EmployeeRecord,
        CreateDepartmentRequest,
        DepartmentPatch,
        DepartmentRecord
    )),
    tags(
        (name = "employees", description = "Employee management"),
        (name = "departments", description = "Department management")
    )
)]
pub struct EmployeeApiDoc;

pub fn router(state: AppState, tokens: Arc<TokenService>) -> Router {
    Router::new()
        .route("/employees", get(list_employees).post(create_employee))
        .route(
            "/employees/:id",
            get(get_employee).put(update_employee).delete(delete_employee),
        )
        .route("/employees/department/:id", get(list_department_employees))
        .route("/department", get(list_departments).post(create_department))
        .route(
            "/department/:id",
            get(get_department).put(update_department).delete(delete_department),
        )
        .layer(Extension(state))
        .layer(Extension(tokens))
}
