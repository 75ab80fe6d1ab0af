//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use routes::create_router;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Layers run last-added first: logging -> request context -> (admin auth) -> handler
    let api_router = create_router(state.clone())
        .layer(axum_middleware::from_fn(middleware::request_context_middleware))
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    Router::new()
        // Health check (no auth)
        .route("/health", get(health_check))
        .nest("/api/v1", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
