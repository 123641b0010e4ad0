//! Account counts.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use crate::AppState;
use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct Response {
    success: bool,
    total_users: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    programme: Option<String>,
}

impl Response {
    fn total(total_users: usize) -> Self {
        Self {
            success: true,
            total_users,
            session: None,
            programme: None,
        }
    }
}

pub async fn total(State(state): State<AppState>) -> Result<Json<Response>> {
    let total = state.provisioning.total_users().await?;
    Ok(Json(Response::total(total)))
}

pub async fn by_session(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> Result<Json<Response>> {
    let total = state.provisioning.total_users_by_session(&session).await?;
    Ok(Json(Response {
        session: Some(session),
        ..Response::total(total)
    }))
}

pub async fn by_programme(
    State(state): State<AppState>,
    Path(programme): Path<String>,
) -> Result<Json<Response>> {
    let total = state
        .provisioning
        .total_users_by_programme(&programme)
        .await?;
    Ok(Json(Response {
        programme: Some(programme),
        ..Response::total(total)
    }))
}
