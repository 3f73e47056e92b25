//! Circula Server - Library Circulation Engine
//!
//! REST API server for book inventory, the loan lifecycle, fines and
//! overdue reminders.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use circula_server::{
    api,
    config::AppConfig,
    repository::Repository,
    services::{reminders::SmtpNotifier, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("circula_server={},tower_http=debug", config.logging.level).into()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Circula Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Create repository and seed the initial policy on an empty database
    let repository = Repository::new(pool);
    let fine_per_day = Decimal::try_from(config.circulation.fine_per_day)
        .map_err(|e| anyhow::anyhow!("Invalid fine_per_day in configuration: {}", e))?;
    repository
        .policies
        .seed_default(
            config.circulation.default_loan_days,
            fine_per_day,
            config.circulation.max_borrow_limit,
            config.circulation.max_renewals,
        )
        .await
        .expect("Failed to seed circulation policy");

    // Save server address before moving config
    let server_host = config.server.host.clone();
    let server_port = config.server.port;
    let sweep_interval = Duration::from_secs(config.circulation.sweep_interval_secs);

    // Create services over the store and SMTP notifier
    let notifier = Arc::new(SmtpNotifier::new(config.email.clone()));
    let services = Services::new(Arc::new(repository), notifier, &config.circulation);

    // Overdue reminder sweep: idempotent per day, cancelled with the server
    let sweep = tokio::spawn(
        services
            .reminders
            .clone()
            .run_sweep_loop(sweep_interval),
    );

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(
        server_host.parse().expect("Invalid host address"),
        server_port,
    );

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    sweep.abort();
    Ok(())
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Books (inventory)
        .route("/books", get(api::books::list_books))
        .route("/books", post(api::books::create_book))
        .route("/books/:id", get(api::books::get_book))
        .route("/books/:id", put(api::books::update_book))
        .route("/books/:id", delete(api::books::delete_book))
        // Loans
        .route("/loans", get(api::loans::list_loans))
        .route("/loans", post(api::loans::request_loan))
        .route("/loans/overdue", get(api::loans::list_overdue))
        .route("/loans/:id", get(api::loans::get_loan))
        .route("/loans/:id/approve", post(api::loans::approve_loan))
        .route("/loans/:id/reject", post(api::loans::reject_loan))
        .route("/loans/:id/return", post(api::loans::return_loan))
        .route("/loans/:id/renew", post(api::loans::renew_loan))
        .route("/loans/:id/remind", post(api::loans::remind_loan))
        // Policy
        .route("/policy", get(api::policies::get_policy))
        .route("/policy", post(api::policies::publish_policy))
        .with_state(state.clone());

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
