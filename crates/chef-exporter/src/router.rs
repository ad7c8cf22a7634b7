//! HTTP router configuration

use std::sync::Arc;

use axum::{Router, routing::get};

use crate::api::{landing, metrics};
use crate::state::AppState;

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let telemetry_path = state.config.web.telemetry_path.clone();
    Router::new()
        .route("/", get(landing::index))
        .route(&telemetry_path, get(metrics::metrics))
        .with_state(state)
}
