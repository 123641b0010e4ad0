//! Public status and metrics pages.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::AppState;

/// Structured status.
#[derive(Serialize)]
pub struct Status {
    name: String,
    version: String,
}

/// Public server status.
pub async fn status(State(state): State<AppState>) -> Json<Status> {
    let name = if state.config.name.is_empty() {
        env!("CARGO_CRATE_NAME").to_owned()
    } else {
        state.config.name.clone()
    };

    Json(Status {
        name,
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Prometheus exposition.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
