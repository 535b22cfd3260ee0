//! HTTP routes

mod ask;
mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use seesay_core::ServerConfig;
use std::path::Path;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main API router; `static_dir` is served under `/static`.
pub fn create_router(state: AppState, server: &ServerConfig, static_dir: &Path) -> Router {
    let api_routes = Router::new()
        .route(
            "/ask",
            post(ask::ask).layer(DefaultBodyLimit::max(server.upload_limit_bytes)),
        )
        .route("/health", get(health::health));

    let router = Router::new()
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http());

    let router = if server.cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
