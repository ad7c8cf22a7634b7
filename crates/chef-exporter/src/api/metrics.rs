//! Prometheus scrape endpoint

use std::sync::Arc;

use axum::{extract::State, http::header, response::IntoResponse};
use chef_exporter_core::{encode_text, text_content_type};

use crate::api::error::AppError;
use crate::state::AppState;

/// Run one scrape cycle and return the text exposition
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let families = state.exporter.collect().await;
    let body = encode_text(&families)?;
    Ok(([(header::CONTENT_TYPE, text_content_type())], body))
}
