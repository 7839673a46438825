//! Wallet Ledger Server - Main Application Entry Point
//!
//! A REST API server for a personal-finance wallet: users own accounts
//! (with optional components), and transactions move money between
//! accounts and external parties. Every balance-mutating path runs inside
//! a database transaction with row locks, so concurrent requests on the
//! same account serialize through the store.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Money**: rust_decimal end to end, no floats
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod models;
mod services;

use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging. Reads RUST_LOG (defaults to "info").
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        // Transaction routes
        .route(
            "/transaction",
            post(handlers::transactions::create_transaction)
                .get(handlers::transactions::list_transactions),
        )
        .route(
            "/transaction/{id}",
            get(handlers::transactions::get_transaction),
        )
        .route(
            "/transaction/account/{account_id}",
            get(handlers::transactions::list_account_transactions),
        )
        // Account routes
        .route(
            "/account",
            post(handlers::accounts::create_account).get(handlers::accounts::list_accounts),
        )
        .route(
            "/account/{id}",
            get(handlers::accounts::get_account)
                .put(handlers::accounts::update_account)
                .delete(handlers::accounts::delete_account),
        )
        // User routes
        .route(
            "/user",
            post(handlers::users::create_user).get(handlers::users::list_users),
        )
        .route(
            "/user/{id}",
            get(handlers::users::get_user).delete(handlers::users::delete_user),
        )
        // Administrative database utilities
        .route("/database/reset", post(handlers::database::reset_database))
        .route("/database/status", get(handlers::database::database_status))
        // Explicit per-request deadline; the transaction path otherwise has
        // no application-level timeout of its own.
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        // Distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // The SPA frontend calls from a different origin
        .layer(CorsLayer::permissive())
        // Share database pool with all handlers via State extraction
        .with_state(pool);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Serve HTTP requests, handling them concurrently with tokio
    axum::serve(listener, app).await?;

    Ok(())
}
