//! StaffSync API Gateway
//!
//! Single public entry point. Verifies the `access_token` cookie (or Bearer
//! header) and forwards requests to the owning service with the token
//! re-attached as `Authorization: Bearer`. Signup, login and health paths
//! are public; the services' internal ingest endpoints are never exposed.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SS_GATEWAY_PORT` | `8080` | HTTP port |
//! | `SS_AUTH_URL` | `http://localhost:8081` | Auth service base URL |
//! | `SS_EMPLOYEE_URL` | `http://localhost:8082` | Employee service base URL |
//! | `SS_SECRETS_PROVIDER` | `env` | Secrets provider: `env`, `file` |
//! | `SS_SECRETS_DIR` | `/run/secrets` | Secret files directory (file provider) |
//! | `SS_JWT_SECRET` | - | Token verification secret (required, via provider) |
//! | `RUST_LOG` | `info` | Log level |

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::extract::{Extension, Request};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ss_common::token::extract_token;
use ss_common::{ApiFailure, StaffSyncError, TokenService};
use ss_secrets::{create_provider, SecretsConfig};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Clone)]
struct GatewayState {
    client: reqwest::Client,
    auth_base: String,
    employee_base: String,
    tokens: Arc<TokenService>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Starting StaffSync API Gateway");

    let port: u16 = env_or_parse("SS_GATEWAY_PORT", 8080);
    let auth_base = env_or("SS_AUTH_URL", "http://localhost:8081");
    let employee_base = env_or("SS_EMPLOYEE_URL", "http://localhost:8082");

    let secrets_config = SecretsConfig {
        provider: env_or("SS_SECRETS_PROVIDER", "env"),
        data_dir: env_or("SS_SECRETS_DIR", "/run/secrets").into(),
    };
    let secrets = create_provider(&secrets_config)?;
    let jwt_secret = secrets.get("SS_JWT_SECRET").await?;

    let state = GatewayState {
        client: reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?,
        auth_base: auth_base.clone(),
        employee_base: employee_base.clone(),
        tokens: Arc::new(TokenService::new(&jwt_secret)),
    };

    let app = Router::new()
        .route("/health", get(health_handler))
        .fallback(proxy)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{port}");
    info!("Gateway listening on http://{}", addr);
    info!("Forwarding to auth={} employee={}", auth_base, employee_base);

    let listener = TcpListener::bind(&addr).await?;
    let api_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Gateway server error: {}", e);
        }
    });

    shutdown_signal().await;
    info!("Shutdown signal received...");
    api_task.abort();

    info!("StaffSync API Gateway shutdown complete");
    Ok(())
}

/// Paths reachable without a token. API docs are served by the services on
/// their own ports and are not proxied.
fn is_public(method: &Method, path: &str) -> bool {
    if path == "/login" {
        return true;
    }
    if path == "/users" && method == Method::POST {
        return true;
    }
    path == "/health"
}

fn upstream_base<'a>(state: &'a GatewayState, path: &str) -> Option<&'a str> {
    if path == "/login" || path == "/users" || path.starts_with("/users/") {
        return Some(&state.auth_base);
    }
    if path == "/employees"
        || path.starts_with("/employees/")
        || path == "/department"
        || path.starts_with("/department/")
    {
        return Some(&state.employee_base);
    }
    None
}

async fn proxy(Extension(state): Extension<GatewayState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    let fail = |error: StaffSyncError| ApiFailure::new(error, path.clone()).into_response();

    // The ingest endpoints are service-to-service only.
    if path.starts_with("/internal") {
        return fail(StaffSyncError::not_found("Route", &path));
    }

    let Some(base) = upstream_base(&state, &path) else {
        return fail(StaffSyncError::not_found("Route", &path));
    };

    let token = if is_public(&parts.method, &path) {
        None
    } else {
        let Some(token) = extract_token(&parts) else {
            return fail(StaffSyncError::auth("Missing credentials"));
        };
        if let Err(e) = state.tokens.verify(&token) {
            return fail(e);
        }
        Some(token)
    };

    let url = match parts.uri.query() {
        Some(query) => format!("{base}{path}?{query}"),
        None => format!("{base}{path}"),
    };

    let method = match reqwest::Method::from_bytes(parts.method.as_str().as_bytes()) {
        Ok(m) => m,
        Err(_) => return fail(StaffSyncError::validation("Unsupported method")),
    };

    let body = match axum::body::to_bytes(body, 2 * 1024 * 1024).await {
        Ok(bytes) => bytes,
        Err(_) => return fail(StaffSyncError::validation("Request body too large")),
    };

    let mut upstream = state.client.request(method, &url).body(body.to_vec());
    if let Some(content_type) = parts.headers.get(axum::http::header::CONTENT_TYPE) {
        if let Ok(value) = content_type.to_str() {
            upstream = upstream.header(reqwest::header::CONTENT_TYPE, value);
        }
    }
    if let Some(token) = token {
        upstream = upstream.header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let response = match upstream.send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(path = %path, "Upstream request failed: {}", e);
            return fail(StaffSyncError::internal("Upstream unavailable"));
        }
    };

    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string();
    let set_cookie = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(path = %path, "Upstream body read failed: {}", e);
            return fail(StaffSyncError::internal("Upstream unavailable"));
        }
    };

    let mut builder = Response::builder()
        .status(status)
        .header(axum::http::header::CONTENT_TYPE, content_type);
    if let Some(cookie) = set_cookie {
        builder = builder.header(axum::http::header::SET_COOKIE, cookie);
    }
    builder
        .body(Body::from(bytes))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}

async fn health_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> GatewayState {
        GatewayState {
            client: reqwest::Client::new(),
            auth_base: "http://auth".to_string(),
            employee_base: "http://employee".to_string(),
            tokens: Arc::new(TokenService::new("test-secret")),
        }
    }

    #[test]
    fn every_public_path_is_served_locally_or_proxied() {
        let state = state();
        for (method, path) in [(Method::POST, "/login"), (Method::POST, "/users")] {
            assert!(is_public(&method, path), "{path} should be public");
            assert!(
                upstream_base(&state, path).is_some(),
                "{path} needs an upstream"
            );
        }
        // /health is answered by the gateway itself.
        assert!(is_public(&Method::GET, "/health"));
    }

    #[test]
    fn docs_paths_are_not_whitelisted() {
        assert!(!is_public(&Method::GET, "/swagger-ui"));
        assert!(!is_public(&Method::GET, "/swagger-ui/index.html"));
        assert!(!is_public(&Method::GET, "/q/openapi"));
    }

    #[test]
    fn only_signup_is_public_on_the_users_path() {
        assert!(is_public(&Method::POST, "/users"));
        assert!(!is_public(&Method::GET, "/users"));
        assert!(!is_public(&Method::DELETE, "/users"));
    }

    #[test]
    fn routing_splits_on_service_ownership() {
        let state = state();
        assert_eq!(upstream_base(&state, "/users/4"), Some("http://auth"));
        assert_eq!(upstream_base(&state, "/employees/4"), Some("http://employee"));
        assert_eq!(upstream_base(&state, "/department"), Some("http://employee"));
        assert_eq!(upstream_base(&state, "/nope"), None);
    }
}
