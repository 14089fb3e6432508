//! Web router using Axum

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;

/// Create the API router.
///
/// Every route answers with and without the trailing slash.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/api/chat/", post(handlers::chat))
        .route(
            "/api/sessions",
            get(handlers::list_sessions).post(handlers::upsert_session),
        )
        .route(
            "/api/sessions/",
            get(handlers::list_sessions).post(handlers::upsert_session),
        )
        .route(
            "/api/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route(
            "/api/sessions/{id}/",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/api/health", get(handlers::health))
        .route("/api/health/", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
