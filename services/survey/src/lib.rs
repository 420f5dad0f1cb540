//! HTTP shell around the rating store and session cursor.

pub mod config;
pub mod error;
pub mod routes_modalities;
pub mod routes_sessions;
pub mod session;
pub mod state;
pub mod store_exec;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(routes_modalities::get_health))
        .route("/modalities", get(routes_modalities::get_modalities))
        .route("/modalities/:modality/summary", get(routes_modalities::get_summary))
        .route("/modalities/:modality/export", get(routes_modalities::get_export))
        .route("/sessions", post(routes_sessions::post_session))
        .route(
            "/sessions/:id",
            get(routes_sessions::get_session).delete(routes_sessions::delete_session),
        )
        .route("/sessions/:id/events", post(routes_sessions::post_event))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
