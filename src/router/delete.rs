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
}

/// Handler to delete an account.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<axum::Json<Done>> {
    state.provisioning.delete_user(&body.email).await?;

    Ok(Done::new(format!("User '{}' deleted successfully", body.email)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::directory::DirectoryError;
    use crate::make_request;
    use crate::testing::{self, API_KEY, FakeDirectory, account};

    #[tokio::test]
    async fn test_delete_handler() {
        let directory = Arc::new(FakeDirectory::with_users([account(
            "aobi@x.edu",
            vec![],
        )]));
        let app = testing::app(directory.clone(), Arc::default());

        let response = make_request(
            app,
            Method::POST,
            "/email/delete-user",
            json!({ "email": "aobi@x.edu" }).to_string(),
            Some(API_KEY),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = testing::json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "User 'aobi@x.edu' deleted successfully");
        assert!(directory.user("aobi@x.edu").is_none());
    }

    #[tokio::test]
    async fn test_delete_when_rate_limited() {
        let directory = Arc::new(FakeDirectory::with_users([account(
            "aobi@x.edu",
            vec![],
        )]));
        directory.fail_with(|| DirectoryError::RateLimited {
            message: "Quota exceeded".into(),
        });
        let app = testing::app(directory.clone(), Arc::default());

        let response = make_request(
            app,
            Method::POST,
            "/email/delete-user",
            json!({ "email": "aobi@x.edu" }).to_string(),
            Some(API_KEY),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = testing::json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error_code"], 429);
        assert!(directory.user("aobi@x.edu").is_some());
    }
}
