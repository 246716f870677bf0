use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth, dashboard, handlers, SharedState};

/// Create the main application router with all API endpoints
pub fn create_router(state: SharedState) -> Router {
    // Create CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Authentication
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        // Global Google credentials
        .route("/api/credentials", put(handlers::set_credentials))
        // Monitor configurations
        .route(
            "/api/configs",
            get(handlers::list_configs).post(handlers::create_config),
        )
        .route(
            "/api/configs/:id",
            get(handlers::get_config)
                .put(handlers::update_config)
                .delete(handlers::delete_config),
        )
        // Category definitions
        .route("/api/configs/:id/categories", post(handlers::add_category))
        .route(
            "/api/configs/:id/categories/:category_id",
            put(handlers::update_category).delete(handlers::delete_category),
        )
        // Dashboard
        .route("/api/configs/:id/dashboard", get(dashboard::dashboard))
        // Add shared state
        .with_state(state)
        // Add middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
