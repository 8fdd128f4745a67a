//! HS256 access tokens and the shared request extractor.
//!
//! Every service verifies tokens itself; the gateway only pre-checks. The
//! token lifetime matches the `access_token` cookie's Max-Age so the cookie
//! and the JWT inside it expire together.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiFailure, StaffSyncError};
use crate::event::Role;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const TOKEN_VALIDITY_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Email of the authenticated user.
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validity: Duration,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self::with_validity(secret, Duration::days(TOKEN_VALIDITY_DAYS))
    }

    pub fn with_validity(secret: &str, validity: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validity,
        }
    }

    pub fn issue(&self, email: &str, role: Role) -> Result<String, StaffSyncError> {
        let now = Utc::now();
        let claims = Claims {
            sub: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.validity).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| StaffSyncError::internal(format!("Token signing failed: {e}")))
    }

    /// Verify signature and expiry. Every failure collapses to a single 401
    /// so callers can't distinguish expired from forged.
    pub fn verify(&self, token: &str) -> Result<Claims, StaffSyncError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| StaffSyncError::auth("Invalid or expired token"))
    }
}

/// Token from the `Authorization: Bearer` header, falling back to the
/// `access_token` cookie.
pub fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }
    CookieJar::from_headers(&parts.headers)
        .get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
}

/// Extractor for authenticated requests. Routers that use it must layer
/// `Extension(Arc<TokenService>)`.
pub struct AuthClaims(pub Claims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthClaims
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path().to_string();
        let reject = |error: StaffSyncError| ApiFailure::new(error, path.clone()).into_response();

        let token = extract_token(parts)
            .ok_or_else(|| reject(StaffSyncError::auth("Missing credentials")))?;

        let tokens = parts
            .extensions
            .get::<Arc<TokenService>>()
            .ok_or_else(|| reject(StaffSyncError::internal("TokenService not found")))?;

        let claims = tokens.verify(&token).map_err(reject)?;
        Ok(AuthClaims(claims))
    }
}

pub fn require_admin(claims: &Claims) -> Result<(), StaffSyncError> {
    require_any_role(claims, &[Role::Admin])
}

pub fn require_any_role(claims: &Claims, allowed: &[Role]) -> Result<(), StaffSyncError> {
    if allowed.contains(&claims.role) {
        Ok(())
    } else {
        Err(StaffSyncError::access_denied(format!(
            "Requires one of: {}",
            allowed
                .iter()
                .map(Role::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}
