//! Password reset.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[serde(default)]
    #[validate(email(message = "Email is required and must be valid."))]
    email: String,
    #[serde(default)]
    #[validate(length(
        min = 8,
        max = 100,
        message = "Password must be 8 to 100 characters long."
    ))]
    password: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    success: bool,
    message: String,
    password: String,
}

pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    state
        .provisioning
        .reset_password(&body.email, &body.password)
        .await?;

    Ok(Json(Response {
        success: true,
        message: "Password reset successfully".into(),
        password: body.password,
    }))
}
