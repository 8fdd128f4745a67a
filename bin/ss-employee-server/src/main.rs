//! StaffSync Employee Server
//!
//! Employee and department management, plus the consumer side of the
//! auth-originated lifecycle events. On first run it seeds the default
//! department.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SS_EMPLOYEE_PORT` | `8082` | HTTP API port |
//! | `SS_EMPLOYEE_DB_URL` | `sqlite:staffsync-employee.db?mode=rwc` | SQLite database URL |
//! | `SS_AUTH_URL` | `http://localhost:8081` | Peer auth service base URL |
//! | `SS_SECRETS_PROVIDER` | `env` | Secrets provider: `env`, `file` |
//! | `SS_SECRETS_DIR` | `/run/secrets` | Secret files directory (file provider) |
//! | `SS_JWT_SECRET` | - | Token verification secret (required, via provider) |
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

use ss_bus::topic::ALL_TOPICS;
use ss_bus::{
    ingest_router, ConsumerConfig, EventDispatcher, HttpEventPublisher, LogDeadLetterSink,
};
use ss_common::TokenService;
use ss_employee::{
    api, DefaultSeeder, DepartmentService, DepartmentStore, EmployeeApiDoc, EmployeeEventHandler,
    EmployeeService, EmployeeStore, SeedConfig,
};
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

    info!("Starting StaffSync Employee Server");

    let port: u16 = env_or_parse("SS_EMPLOYEE_PORT", 8082);
    let db_url = env_or("SS_EMPLOYEE_DB_URL", "sqlite:staffsync-employee.db?mode=rwc");
    let auth_url = env_or("SS_AUTH_URL", "http://localhost:8081");
    let poll_ms: u64 = env_or_parse("SS_OUTBOX_POLL_MS", 500);
    let batch_size: u32 = env_or_parse("SS_OUTBOX_BATCH_SIZE", 50);

    let secrets_config = SecretsConfig {
        provider: env_or("SS_SECRETS_PROVIDER", "env"),
        data_dir: env_or("SS_SECRETS_DIR", "/run/secrets").into(),
    };
    let secrets = create_provider(&secrets_config)?;
    let jwt_secret = secrets.get("SS_JWT_SECRET").await?;

    // Stores and schema
    let pool = SqlitePoolOptions::new().max_connections(5).connect(&db_url).await?;
    let employees = EmployeeStore::new(pool.clone());
    employees.init_schema().await?;
    let departments = DepartmentStore::new(pool.clone());
    departments.init_schema().await?;
    let outbox = Arc::new(SqliteOutboxRepository::new(pool.clone()));
    outbox.init_schema().await?;
    info!("Employee store initialized: {}", db_url);

    // First-run seeding
    let seeder = DefaultSeeder::new(DepartmentStore::new(pool.clone()), SeedConfig::default());
    seeder.run().await?;

    // Services
    let tokens = Arc::new(TokenService::new(&jwt_secret));
    let employee_service = Arc::new(EmployeeService::new(
        EmployeeStore::new(pool.clone()),
        DepartmentStore::new(pool.clone()),
    ));
    let department_service = Arc::new(DepartmentService::new(DepartmentStore::new(pool.clone())));

    // Outbox relay publishing to the auth service
    let publisher = Arc::new(HttpEventPublisher::new(auth_url.clone())?);
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
    info!("Outbox relay started, publishing to {}", auth_url);

    // Inbound events from the auth service
    let handler = Arc::new(EmployeeEventHandler::new(EmployeeStore::new(pool.clone())));
    let mut dispatcher = EventDispatcher::new(
        ConsumerConfig::default(),
        Arc::new(LogDeadLetterSink),
    );
    for topic in ALL_TOPICS {
        dispatcher = dispatcher.route(topic, handler.clone());
    }
    let dispatcher = Arc::new(dispatcher);

    let app = api::router(
        api::AppState {
            employees: employee_service,
            departments: department_service,
        },
        tokens,
    )
    .merge(ingest_router(dispatcher))
    .merge(SwaggerUi::new("/swagger-ui").url("/q/openapi", EmployeeApiDoc::openapi()))
    .route("/health", axum::routing::get(health_handler))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = format!("0.0.0.0:{port}");
    info!("Employee API listening on http://{}", addr);
    let listener = TcpListener::bind(&addr).await?;
    let api_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    info!("StaffSync Employee Server started");
    shutdown_signal().await;
    info!("Shutdown signal received...");

    api_task.abort();
    relay_task.abort();

    info!("StaffSync Employee Server shutdown complete");
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
