//! Axum router assembly, grounded on `dashflow-langserve::server::add_routes`.

use crate::state::AppState;
use crate::{handlers, playground, ws};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the full application router over `state`.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/", get(playground::index))
        .route("/health", get(handlers::health))
        .route("/research", post(handlers::research))
        .route("/deep-research", post(handlers::deep_research))
        .route("/tasks/:id/status", get(handlers::task_status))
        .route("/reports/:id", get(handlers::report))
        .route("/deep-research/:id", get(handlers::report))
        .route("/traces/:id", get(handlers::traces))
        .route("/ws/progress/:id", get(ws::progress))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
