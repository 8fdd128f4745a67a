//! StaffSync shared types
//!
//! Types that cross service boundaries:
//! - User lifecycle events and the role model
//! - Outbox item shape shared by the outbox store and the relay
//! - HTTP response envelopes (success and error)
//! - The error taxonomy with its HTTP mapping
//! - The partial-update merge contract
//! - Access tokens and the authenticated-request extractor

pub mod error;
pub mod event;
pub mod merge;
pub mod outbox;
pub mod response;
pub mod token;

pub use error::{ApiFailure, IntoApiResult, StaffSyncError};
pub use event::{is_password_hash, EventKind, Role, UserLifecycleEvent};
pub use merge::MergePatch;
pub use outbox::{NewOutboxItem, OutboxItem, OutboxStatus};
pub use response::{ErrorResponse, ServerResponse};
pub use token::{AuthClaims, Claims, TokenService, ACCESS_TOKEN_COOKIE};
