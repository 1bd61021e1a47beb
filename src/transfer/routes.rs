use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::transfer::handlers::{api_not_found, login, logout, store_file, welcome};
use crate::transfer::server::ServerState;

/// No request body limit here; `store_file` enforces the configured upload cap.
pub fn create_routes(state: Arc<ServerState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(welcome))
        .route("/session", post(login).delete(logout))
        .route("/files", post(store_file))
        .fallback(api_not_found)
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::disable())
}
