//! Bind student attributes to an account.

use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::{Done, Valid};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[serde(default)]
    #[validate(email(message = "Email is required and must be valid."))]
    email: String,
    #[serde(default)]
    #[validate(length(
        min = 2,
        max = 50,
        message = "Matric number is required and must be 2 to 50 characters long."
    ))]
    matricno: String,
    #[serde(default)]
    #[validate(length(
        min = 2,
        max = 50,
        message = "Programme is required and must be 2 to 50 characters long."
    ))]
    programme: String,
    #[serde(default)]
    #[validate(length(
        min = 2,
        max = 50,
        message = "Session is required and must be 2 to 50 characters long."
    ))]
    session: String,
}

pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<axum::Json<Done>> {
    state
        .provisioning
        .add_matricno_to_user(
            &body.email,
            body.matricno.trim(),
            body.programme.trim(),
            body.session.trim(),
        )
        .await?;

    Ok(Done::new("User info updated successfully"))
}
