use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::provisioning::NewAccount;
use crate::router::Valid;

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct Body {
    #[serde(default)]
    #[validate(length(
        min = 2,
        max = 50,
        message = "First name is required and must be 2 to 50 characters long."
    ))]
    pub firstname: String,
    #[serde(default)]
    #[validate(length(
        min = 2,
        max = 50,
        message = "Last name is required and must be 2 to 50 characters long."
    ))]
    pub lastname: String,
    #[validate(length(
        min = 2,
        max = 50,
        message = "Other name must be 2 to 50 characters long."
    ))]
    pub othername: Option<String>,
    #[serde(default)]
    #[validate(length(
        min = 2,
        max = 50,
        message = "Domain is required and must be 2 to 50 characters long."
    ))]
    pub domain: String,
    #[validate(length(
        min = 8,
        max = 100,
        message = "Password must be 8 to 100 characters long."
    ))]
    pub password: Option<String>,
    #[validate(length(
        min = 2,
        max = 20,
        message = "Matric number must be 2 to 20 characters long."
    ))]
    pub matricno: Option<String>,
    #[validate(length(
        min = 2,
        max = 50,
        message = "Programme must be 2 to 50 characters long."
    ))]
    pub programme: Option<String>,
    #[validate(length(
        min = 2,
        max = 50,
        message = "Session must be 2 to 50 characters long."
    ))]
    pub session: Option<String>,
}

impl From<Body> for NewAccount {
    fn from(body: Body) -> Self {
        NewAccount {
            firstname: body.firstname,
            lastname: body.lastname,
            othername: body.othername,
            domain: body.domain,
            password: body.password,
            matricno: body.matricno,
            programme: body.programme,
            session: body.session,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub message: String,
    pub email: String,
    pub password: String,
}

/// Handler to create an account.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let account = state.provisioning.create_user(body.into()).await?;

    Ok(Json(Response {
        success: true,
        message: "User created successfully".into(),
        email: account.email,
        password: account.password,
    }))
}
