//! StaffSync authentication service library.
//!
//! Owns the user store and the login/token surface. User mutations stage
//! lifecycle events in the transactional outbox; the bus consumer handler
//! applies employee-originated events to the local store.

pub mod api;
pub mod domain;
pub mod handler;
pub mod password;
pub mod repository;
pub mod seed;
pub mod service;

pub use api::{router, AppState, AuthApiDoc};
pub use domain::{CreateUserRequest, LoginRequest, UserPatch, UserRecord, UserResponse};
pub use handler::AuthEventHandler;
pub use password::PasswordService;
pub use repository::UserStore;
pub use seed::{AdminSeedConfig, AdminSeeder};
pub use service::{AuthService, LoginOutcome};
