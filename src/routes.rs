use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;

use crate::state::AppState;

pub fn configure_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/ready", get(readiness))
}

/// Ready while the broker connection is up; consumers cannot make progress otherwise.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.queue.is_connected().await {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "broker unavailable")
    }
}
