//! Account lookups.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::provisioning::AccountProfile;
use crate::router::Valid;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ByEmail {
    #[serde(default)]
    #[validate(email(message = "Email is required and must be valid."))]
    email: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ByMatricno {
    #[serde(default)]
    #[validate(length(
        min = 1,
        max = 50,
        message = "Matric number is required."
    ))]
    matricno: String,
}

#[derive(Debug, Serialize)]
pub struct Response {
    success: bool,
    user: AccountProfile,
}

/// `POST /email/get-user`.
pub async fn by_email(
    State(state): State<AppState>,
    Valid(body): Valid<ByEmail>,
) -> Result<Json<Response>> {
    let user = state.provisioning.get_user(&body.email).await?;

    Ok(Json(Response {
        success: true,
        user,
    }))
}

/// `POST /email/get-info`.
pub async fn by_matricno(
    State(state): State<AppState>,
    Valid(body): Valid<ByMatricno>,
) -> Result<Json<Response>> {
    let user = state
        .provisioning
        .get_user_by_matricno(body.matricno.trim())
        .await?;

    Ok(Json(Response {
        success: true,
        user,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::directory::ExternalId;
    use crate::make_request;
    use crate::provisioning::{MATRICNO, PROGRAMME, SESSION};
    use crate::testing::{self, API_KEY, FakeDirectory, account};

    fn directory() -> Arc<FakeDirectory> {
        Arc::new(FakeDirectory::with_users([
            account(
                "aobi@x.edu",
                vec![
                    ExternalId::custom(MATRICNO, "U2024/001"),
                    ExternalId::custom(SESSION, "2024/2025"),
                    ExternalId::custom(PROGRAMME, "Computer Science"),
                ],
            ),
            account("other@x.edu", vec![]),
        ]))
    }

    #[tokio::test]
    async fn test_get_user_handler() {
        let app = testing::app(directory(), Arc::default());

        let response = make_request(
            app,
            Method::POST,
            "/email/get-user",
            json!({ "email": "aobi@x.edu" }).to_string(),
            Some(API_KEY),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = testing::json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["primaryEmail"], "aobi@x.edu");
        assert_eq!(body["user"]["givenName"], "Given");
        assert_eq!(body["user"]["middleName"], "");
        assert_eq!(body["user"]["matricno"], "U2024/001");
        assert_eq!(body["user"]["programme"], "Computer Science");
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let app = testing::app(directory(), Arc::default());

        let response = make_request(
            app,
            Method::POST,
            "/email/get-user",
            json!({ "email": "ghost@x.edu" }).to_string(),
            Some(API_KEY),
        )
        .await;

        let body = testing::json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error_code"], 404);
        assert_eq!(body["error"], "User 'ghost@x.edu' not found");
    }

    #[tokio::test]
    async fn test_get_info_handler() {
        let app = testing::app(directory(), Arc::default());

        let response = make_request(
            app.clone(),
            Method::POST,
            "/email/get-info",
            json!({ "matricno": "U2024/001" }).to_string(),
            Some(API_KEY),
        )
        .await;
        let body = testing::json(response).await;
        assert_eq!(body["user"]["primaryEmail"], "aobi@x.edu");
        assert_eq!(body["user"]["session"], "2024/2025");

        let response = make_request(
            app,
            Method::POST,
            "/email/get-info",
            json!({ "matricno": "U1999/404" }).to_string(),
            Some(API_KEY),
        )
        .await;
        let body = testing::json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "No user found with matricno 'U1999/404'");
    }

    #[tokio::test]
    async fn test_get_info_requires_matricno() {
        let app = testing::app(directory(), Arc::default());

        let response =
            make_request(app, Method::POST, "/email/get-info", "{}".into(), Some(API_KEY))
                .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
