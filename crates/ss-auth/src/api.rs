//! Authentication API endpoints.
//!
//! - `POST /users` — signup (public)
//! - `POST /login` — password login; sets the `access_token` cookie
//! - `GET /users`, `GET/PUT/DELETE /users/{id}` — admin user management

use axum::extract::{Extension, Path};
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use utoipa::OpenApi;

use ss_common::token::{require_admin, AuthClaims, ACCESS_TOKEN_COOKIE, TOKEN_VALIDITY_DAYS};
use ss_common::{ApiFailure, IntoApiResult, ServerResponse};

use crate::domain::{CreateUserRequest, LoginRequest, UserPatch, UserResponse};
use crate::service::AuthService;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/users",
    tag = "auth",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Validation failure"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    Extension(state): Extension<AppState>,
    uri: Uri,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let user = state.auth.create_user(req).await.at(uri.path())?;
    Ok((
        StatusCode::CREATED,
        Json(ServerResponse::success("User registered", user)),
    ))
}

/// Login with email and password
///
/// On success the token is returned as the `access_token` cookie:
/// HttpOnly, Secure, SameSite=Strict, 7 days.
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = UserResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    Extension(state): Extension<AppState>,
    jar: CookieJar,
    uri: Uri,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let outcome = state.auth.login(req).await.at(uri.path())?;

    let cookie = Cookie::build((ACCESS_TOKEN_COOKIE, outcome.token))
        .http_only(true)
        .secure(true)
        .path("/")
        .same_site(SameSite::Strict)
        .max_age(time::Duration::days(TOKEN_VALIDITY_DAYS))
        .build();

    Ok((
        jar.add(cookie),
        Json(ServerResponse::success("Login successful", outcome.user)),
    ))
}

/// List all users (ADMIN)
#[utoipa::path(
    get,
    path = "/users",
    tag = "auth",
    responses(
        (status = 200, description = "All users", body = [UserResponse]),
        (status = 403, description = "Requires ADMIN role")
    )
)]
pub async fn list_users(
    Extension(state): Extension<AppState>,
    AuthClaims(claims): AuthClaims,
    uri: Uri,
) -> Result<impl IntoResponse, ApiFailure> {
    require_admin(&claims).at(uri.path())?;
    let users = state.auth.list_users().await.at(uri.path())?;
    Ok(Json(ServerResponse::success("Users retrieved", users)))
}

/// Fetch one user (ADMIN)
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "auth",
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 404, description = "No such user")
    )
)]
pub async fn get_user(
    Extension(state): Extension<AppState>,
    AuthClaims(claims): AuthClaims,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiFailure> {
    require_admin(&claims).at(uri.path())?;
    let user = state.auth.find_user(id).await.at(uri.path())?;
    Ok(Json(ServerResponse::success("User retrieved", user)))
}

/// Update a user (ADMIN)
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "auth",
    request_body = UserPatch,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 404, description = "No such user"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_user(
    Extension(state): Extension<AppState>,
    AuthClaims(claims): AuthClaims,
    uri: Uri,
    Path(id): Path<i64>,
    Json(patch): Json<UserPatch>,
) -> Result<impl IntoResponse, ApiFailure> {
    require_admin(&claims).at(uri.path())?;
    let user = state.auth.update_user(id, patch).await.at(uri.path())?;
    Ok(Json(ServerResponse::success("User updated", user)))
}

/// Delete a user (ADMIN)
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "auth",
    responses(
        (status = 200, description = "User deleted"),
        (status = 404, description = "No such user")
    )
)]
pub async fn delete_user(
    Extension(state): Extension<AppState>,
    AuthClaims(claims): AuthClaims,
    uri: Uri,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiFailure> {
    require_admin(&claims).at(uri.path())?;
    state.auth.delete_user(id).await.at(uri.path())?;
    Ok(Json(ServerResponse::<()>::message_only("User deleted")))
}

#[derive(OpenApi)]
#[openapi(
    paths(signup, login, list_users, get_user, update_user, delete_user),
    components(schemas(CreateUserRequest, LoginRequest, UserPatch, UserResponse)),
    tags((name = "auth", description = "Authentication and user management"))
)]
pub struct AuthApiDoc;

pub fn router(state: AppState) -> Router {
    let tokens = state.auth.tokens();
    Router::new()
        .route("/users", post(signup).get(list_users))
        .route("/login", post(login))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .layer(Extension(state))
        .layer(Extension(tokens))
}
