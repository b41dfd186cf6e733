use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/actions", post(handlers::dispatch))
        .with_state(state)
}
