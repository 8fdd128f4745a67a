//! StaffSync Development Monolith
//!
//! All-in-one binary for local development containing:
//! - Authentication APIs (signup, login, user management)
//! - Employee and department APIs
//! - Both outbox relays, wired over an in-process event bus
//! - Default department and bootstrap admin seeding
//!
//! Both services run against in-memory SQLite databases, so every start is a
//! clean slate. No gateway is needed: the two API surfaces are merged into a
//! single router on one port.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use ss_auth::{
    api as auth_api, AdminSeedConfig, AdminSeeder, AuthApiDoc, AuthEventHandler, AuthService,
    PasswordService, UserStore,
};
use ss_bus::topic::ALL_TOPICS;
use ss_bus::{run_consumer, ConsumerConfig, EventDispatcher, InMemoryBus, LogDeadLetterSink};
use ss_common::TokenService;
use ss_employee::{
    api as employee_api, DefaultSeeder, DepartmentService, DepartmentStore, EmployeeApiDoc,
    EmployeeEventHandler, EmployeeService, EmployeeStore, SeedConfig,
};
use ss_outbox::sqlite::SqliteOutboxRepository;
use ss_outbox::{OutboxRelay, OutboxRelayConfig};

/// StaffSync Development Server
#[derive(Parser, Debug)]
#[command(name = "ss-dev")]
#[command(about = "StaffSync Development Monolith - all services in one binary")]
struct Args {
    /// HTTP port for the combined API
    #[arg(long, env = "SS_DEV_PORT", default_value = "8080")]
    port: u16,

    /// Token signing secret (development default, never use in production)
    #[arg(long, env = "SS_JWT_SECRET", default_value = "dev-secret-change-me")]
    jwt_secret: String,

    /// Seed the default department and bootstrap admin on startup
    #[arg(long, env = "SS_SEED", default_value = "true")]
    seed: bool,

    /// Bootstrap admin email
    #[arg(long, env = "SS_SEED_ADMIN_EMAIL", default_value = "admin@staffsync.io")]
    admin_email: String,

    /// Bootstrap admin password
    #[arg(long, env = "SS_SEED_ADMIN_PASSWORD", default_value = "ChangeMe123!")]
    admin_password: String,

    /// Outbox relay poll interval in milliseconds
    #[arg(long, env = "SS_OUTBOX_POLL_MS", default_value = "200")]
    poll_ms: u64,
}

/// In-memory SQLite needs a single connection: each connection would
/// otherwise see its own empty database.
async fn memory_pool() -> Result<SqlitePool> {
    Ok(SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    info!("Starting StaffSync Development Monolith");

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    // Auth side: store, outbox, service
    let auth_pool = memory_pool().await?;
    let user_store = UserStore::new(auth_pool.clone());
    user_store.init_schema().await?;
    let auth_outbox = Arc::new(SqliteOutboxRepository::new(auth_pool.clone()));
    auth_outbox.init_schema().await?;

    let tokens = Arc::new(TokenService::new(&args.jwt_secret));
    let auth_service = Arc::new(AuthService::new(
        UserStore::new(auth_pool.clone()),
        PasswordService::new(),
        tokens.clone(),
    ));

    // Employee side: stores, outbox, services
    let employee_pool = memory_pool().await?;
    let employee_store = EmployeeStore::new(employee_pool.clone());
    employee_store.init_schema().await?;
    let department_store = DepartmentStore::new(employee_pool.clone());
    department_store.init_schema().await?;
    let employee_outbox = Arc::new(SqliteOutboxRepository::new(employee_pool.clone()));
    employee_outbox.init_schema().await?;

    let employee_service = Arc::new(EmployeeService::new(
        EmployeeStore::new(employee_pool.clone()),
        DepartmentStore::new(employee_pool.clone()),
    ));
    let department_service =
        Arc::new(DepartmentService::new(DepartmentStore::new(employee_pool.clone())));

    // Event bus: consumers must subscribe before the relays publish,
    // the in-memory bus does not replay.
    let bus = Arc::new(InMemoryBus::new());

    let auth_handler = Arc::new(AuthEventHandler::new(
        UserStore::new(auth_pool.clone()),
        PasswordService::new(),
    ));
    let mut auth_dispatcher =
        EventDispatcher::new(ConsumerConfig::default(), Arc::new(LogDeadLetterSink));
    for topic in ALL_TOPICS {
        auth_dispatcher = auth_dispatcher.route(topic, auth_handler.clone());
    }
    let auth_dispatcher = Arc::new(auth_dispatcher);
    for topic in ALL_TOPICS {
        let rx = bus.subscribe(topic);
        tasks.push(tokio::spawn(run_consumer(rx, auth_dispatcher.clone())));
    }

    let employee_handler =
        Arc::new(EmployeeEventHandler::new(EmployeeStore::new(employee_pool.clone())));
    let mut employee_dispatcher =
        EventDispatcher::new(ConsumerConfig::default(), Arc::new(LogDeadLetterSink));
    for topic in ALL_TOPICS {
        employee_dispatcher = employee_dispatcher.route(topic, employee_handler.clone());
    }
    let employee_dispatcher = Arc::new(employee_dispatcher);
    for topic in ALL_TOPICS {
        let rx = bus.subscribe(topic);
        tasks.push(tokio::spawn(run_consumer(rx, employee_dispatcher.clone())));
    }

    // Relays drain each service's outbox onto the shared bus
    let relay_config = OutboxRelayConfig {
        poll_interval: Duration::from_millis(args.poll_ms),
        ..Default::default()
    };
    let auth_relay = OutboxRelay::new(auth_outbox, bus.clone(), relay_config.clone());
    tasks.push(tokio::spawn(async move { auth_relay.start().await }));
    let employee_relay = OutboxRelay::new(employee_outbox, bus.clone(), relay_config);
    tasks.push(tokio::spawn(async move { employee_relay.start().await }));
    info!("Outbox relays started on in-process bus");

    if args.seed {
        AdminSeeder::new(
            auth_service.clone(),
            AdminSeedConfig {
                email: args.admin_email.clone(),
                password: args.admin_password.clone(),
            },
        )
        .run()
        .await?;
        DefaultSeeder::new(
            DepartmentStore::new(employee_pool.clone()),
            SeedConfig::default(),
        )
        .run()
        .await?;
        info!("Seeded default department and admin ({})", args.admin_email);
    }

    let app = auth_api::router(auth_api::AppState { auth: auth_service })
        .merge(employee_api::router(
            employee_api::AppState {
                employees: employee_service,
                departments: department_service,
            },
            tokens,
        ))
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/q/openapi/auth", AuthApiDoc::openapi())
                .url("/q/openapi/employee", EmployeeApiDoc::openapi()),
        )
        .route("/health", axum::routing::get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = format!("0.0.0.0:{}", args.port);
    info!("Combined API listening on http://{}", addr);
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    let listener = TcpListener::bind(&addr).await?;
    let api_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    info!("StaffSync Development Monolith started");
    shutdown_signal().await;
    info!("Shutdown signal received...");

    api_task.abort();
    for task in tasks {
        task.abort();
    }

    info!("StaffSync Development Monolith shutdown complete");
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
