use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all Ephemera endpoints.
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.store.config().max_object_size).unwrap_or(usize::MAX);

    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/objects", post(handler::put_object))
        .route(
            "/v1/objects/:id",
            get(handler::get_object).delete(handler::delete_object),
        )
        .route("/v1/objects/:id/:name", get(handler::get_named_object))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
