//! # openmemory-server
//!
//! The HTTP transport over the engine crates, plus the operational CLI.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

/// Assemble the full route tree.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.get().max_payload_size * 2;

    let admin = Router::new()
        .route("/admin/users", get(routes::admin::list_users))
        .route(
            "/admin/users/:id",
            get(routes::admin::get_user).delete(routes::admin::delete_user),
        )
        .route(
            "/admin/users/:id/keys",
            get(routes::admin::list_keys).post(routes::admin::create_key),
        )
        .route("/admin/backup/status", get(routes::admin::backup_status))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/sectors", get(routes::system::sectors))
        .route("/dashboard/stats", get(routes::system::dashboard_stats))
        .route(
            "/embed/config",
            get(routes::system::embed_config).post(routes::system::set_embed_config),
        )
        .route("/embed/ollama/status", get(routes::system::daemon_status))
        .route("/memory/add", post(routes::memory::add))
        .route("/memory/query", post(routes::memory::query))
        .route("/memory/all", get(routes::memory::list))
        .route("/memory/ingest", post(routes::memory::ingest))
        .route("/memory/reinforce", post(routes::memory::reinforce))
        .route(
            "/memory/:id",
            get(routes::memory::get_one)
                .patch(routes::memory::patch)
                .delete(routes::memory::delete),
        )
        .route("/temporal/fact", post(routes::temporal::insert_fact))
        .route("/temporal/facts", get(routes::temporal::query_facts))
        .route("/temporal/edge", post(routes::temporal::insert_edge))
        .merge(admin)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
