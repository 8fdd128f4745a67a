//! StaffSync Authentication Server
//!
//! User registration, login and user management, plus the consumer side of
//! the employee-originated lifecycle events. On first run it seeds the
//! bootstrap admin login.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SS_AUTH_PORT` | `8081` | HTTP API port |
//! | `SS_AUTH_DB_URL` | `sqlite:staffsync-auth.db?mode=rwc` | SQLite database URL |
//! | `SS_EMPLOYEE_URL` | `http://localhost:8082` | Peer employee service base URL |
//! | `SS_SECRETS_PROVIDER` | `env` | Secrets provider: `env`, `file` |
//! | `SS_SECRETS_DIR` | `/run/secrets` | Secret files directory (file provider) |
//! | `SS_JWT_SECRET` | - | Token signing secret (required, via provider) |
//! | `SS_SEED_ADMIN_EMAIL` | `admin@staffsync.io` | Bootstrap admin email |
//! | `SS_SEED_ADMIN_PASSWORD` | `ChangeMe123!` | Bootstrap admin password |
//! | `SS_OUTBOX_POLL_MS` | `500` | Outbox relay poll interval |
//! | `SS_OUTBOX_BATCH_SIZE` | `50` | Outbox relay batch size |
//! | `RUST_LOG` | `info` | Log level |

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use ss_auth::{
    api, AdminSeedConfig, AdminSeeder, AuthApiDoc, AuthEventHandler, AuthService, PasswordService,
    UserStore,
};
use ss_bus::topic::ALL_TOPICS;
use ss_bus::{
    ingest_router, ConsumerConfig, EventDispatcher, HttpEventPublisher, LogDeadLetterSink,
};
use ss_common::TokenService;
use ss_outbox::sqlite::SqliteOutboxRepository;
use ss_outbox::{OutboxRelay, OutboxRelayConfig};
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

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Starting StaffSync Authentication Server");

    let port: u16 = env_or_parse("SS_AUTH_PORT", 8081);
    let db_url = env_or("SS_AUTH_DB_URL", "sqlite:staffsync-auth.db?mode=rwc");
    let employee_url = env_or("SS_EMPLOYEE_URL", "http://localhost:8082");
    let poll_ms: u64 = env_or_parse("SS_OUTBOX_POLL_MS", 500);
    let batch_size: u32 = env_or_parse("SS_OUTBOX_BATCH_SIZE", 50);

    // Token signing secret via the secrets provider
    let secrets_config = SecretsConfig {
        provider: env_or("SS_SECRETS_PROVIDER", "env"),
        data_dir: env_or("SS_SECRETS_DIR", "/run/secrets").into(),
    };
    let secrets = create_provider(&secrets_config)?;
    let jwt_secret = secrets.get("SS_JWT_SECRET").await?;

    // Store and schema
    let pool = SqlitePoolOptions::new().max_connections(5).connect(&db_url).await?;
    let store = UserStore::new(pool.clone());
    store.init_schema().await?;
    let outbox = Arc::new(SqliteOutboxRepository::new(pool.clone()));
    outbox.init_schema().await?;
    info!("User store initialized: {}", db_url);

    // Services
    let tokens = Arc::new(TokenService::new(&jwt_secret));
    let auth = Arc::new(AuthService::new(
        UserStore::new(pool.clone()),
        PasswordService::new(),
        tokens.clone(),
    ));

    // First-run seeding
    let seeder = AdminSeeder::new(
        auth.clone(),
        AdminSeedConfig {
            email: env_or("SS_SEED_ADMIN_EMAIL", "admin@staffsync.io"),
            password: env_or("SS_SEED_ADMIN_PASSWORD", "ChangeMe123!"),
        },
    );
    seeder.run().await?;

    // Outbox relay publishing to the employee service
    let publisher = Arc::new(HttpEventPublisher::new(employee_url.clone())?);
    let relay = OutboxRelay::new(
        outbox,
        publisher,
        OutboxRelayConfig {
            poll_interval: Duration::from_millis(poll_ms),
            batch_size,
            ..Default::default()
        },
    );
    let relay_task = tokio::spawn(async move { relay.start().await });
    info!("Outbox relay started, publishing to {}", employee_url);

    // Inbound events from the employee service
    let handler = Arc::new(AuthEventHandler::new(
        UserStore::new(pool.clone()),
        PasswordService::new(),
    ));
    let mut dispatcher = EventDispatcher::new(
        ConsumerConfig::default(),
        Arc::new(LogDeadLetterSink),
    );
    for topic in ALL_TOPICS {
        dispatcher = dispatcher.route(topic, handler.clone());
    }
    let dispatcher = Arc::new(dispatcher);

    let app = api::router(api::AppState { auth })
        .merge(ingest_router(dispatcher))
        .merge(SwaggerUi::new("/swagger-ui").url("/q/openapi", AuthApiDoc::openapi()))
        .route("/health", axum::routing::get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = format!("0.0.0.0:{port}");
    info!("Authentication API listening on http://{}", addr);
    let listener = TcpListener::bind(&addr).await?;
    let api_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    info!("StaffSync Authentication Server started");
    shutdown_signal().await;
    info!("Shutdown signal received...");

    api_task.abort();
    relay_task.abort();

    info!("StaffSync Authentication Server shutdown complete");
    Ok(())
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
