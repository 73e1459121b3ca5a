//! Race Analytics - motorsport statistics API server.
//!
//! A data-entry and browsing service for circuits, drivers, constructors,
//! races, and per-race result rows, backed by PostgreSQL.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL behind a self-healing pooled data-access
//!   layer (`db` module); handlers never touch the pool directly
//! - **Authentication**: opaque bearer tokens with SHA-256 digests
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create the database pool (fatal if the store is unreachable)
//! 3. Build the HTTP router with routes and middleware
//! 4. Start the server on the configured port

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::DbPool;
use crate::services::mail_service::Mailer;

/// Shared application state handed to every handler via Axum's `State`
/// extractor. The pool is dependency-injected here; there is no global.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub mailer: Mailer,
}

/// Build the HTTP router: public routes, authenticated routes, and the
/// admin-gated back-office.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    // Admin back-office: authenticated AND admin-gated
    let admin_routes = Router::new()
        .route("/api/v1/admin/tables", get(handlers::admin::list_tables))
        .route(
            "/api/v1/admin/tables/{table}",
            get(handlers::admin::list_records),
        )
        .route(
            "/api/v1/admin/tables/{table}",
            post(handlers::admin::create_record),
        )
        .route(
            "/api/v1/admin/tables/{table}/schema",
            get(handlers::admin::table_schema),
        )
        .route(
            "/api/v1/admin/tables/{table}/{id}",
            get(handlers::admin::get_record),
        )
        .route(
            "/api/v1/admin/tables/{table}/{id}",
            put(handlers::admin::update_record),
        )
        .route(
            "/api/v1/admin/tables/{table}/{id}",
            delete(handlers::admin::delete_record),
        )
        .route_layer(axum_middleware::from_fn(middleware::auth::require_admin));

    // Routes requiring a valid session token
    let authenticated_routes = Router::new()
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route("/api/v1/auth/me", get(handlers::auth::me))
        .route(
            "/api/v1/my/constructors",
            get(handlers::user_data::my_constructors),
        )
        .route("/api/v1/my/drivers", get(handlers::user_data::my_drivers))
        .route("/api/v1/my/races", get(handlers::user_data::my_races))
        .route(
            "/api/v1/my/race-data",
            get(handlers::user_data::my_race_data),
        )
        .merge(admin_routes)
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/auth/register", post(handlers::auth::register))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/verify", get(handlers::auth::verify_email))
        .route("/api/v1/compare/circuits", get(handlers::compare::circuits))
        .route(
            "/api/v1/compare/validate-race",
            get(handlers::compare::validate_race),
        )
        .route(
            "/api/v1/compare/constructors-by-race",
            get(handlers::compare::constructors_by_race),
        )
        .route(
            "/api/v1/compare/drivers-by-race-constructor",
            get(handlers::compare::drivers_by_race_constructor),
        )
        .merge(authenticated_routes)
        // Tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Browser clients live on a different origin
        .layer(cors)
        // Share state with all handlers via State extraction
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Create the pool, assemble the router, and serve until shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
    // Fatal when the backing store is unreachable: surfaced, not swallowed.
    let db = DbPool::connect(config.pool_settings(), config.retry_policy()).await?;

    let mailer = Mailer::from_config(&config);
    let addr = format!("0.0.0.0:{}", config.server_port);
    let state = AppState {
        db: db.clone(),
        config: Arc::new(config),
        mailer,
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);
    axum::serve(listener, app).await?;

    db.shutdown().await;
    Ok(())
}
