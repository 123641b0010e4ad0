//! Error handler for the provisioner.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::Error as SQLxError;
use thiserror::Error;
use validator::ValidationErrors;

use crate::directory::{self, DirectoryError};
use crate::provisioning::ProvisioningError;

pub type Result<T> = std::result::Result<T, ServerError>;

const GENERIC_FAILURE: &str = "Unexpected server error.";

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Validation failed")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("Unauthorized IP address: {0}")]
    UnauthorizedIp(String),

    #[error("Invalid or missing API token")]
    InvalidToken,

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error("SQL request failed: {0}")]
    Sql(#[from] SQLxError),
}

/// Body of every failed response.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<String, Vec<String>>>,
    #[serde(skip)]
    status: StatusCode,
}

impl ResponseError {
    /// Update HTTP status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Update `error_code` field.
    pub fn code(mut self, code: u16) -> Self {
        self.error_code = Some(code);
        self
    }

    /// Update `error` field.
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Update `message` field.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            success: false,
            error_code: None,
            error: None,
            message: None,
            errors: None,
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

fn parse_validation_errors(
    errors: &ValidationErrors,
) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .iter()
        .map(|(field, issues)| {
            (
                field.to_string(),
                issues.iter().map(|issue| issue.to_string()).collect(),
            )
        })
        .collect()
}

fn validation_failed() -> ResponseError {
    ResponseError::default()
        .status(StatusCode::UNPROCESSABLE_ENTITY)
        .code(StatusCode::UNPROCESSABLE_ENTITY.as_u16())
        .message("Validation failed")
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = match &self {
            ServerError::Validation(validation_errors) => {
                validation_failed().errors(validation_errors)
            },

            ServerError::Axum(rejection) => {
                let mut errors = BTreeMap::new();
                errors.insert("body".to_owned(), vec![rejection.body_text()]);
                ResponseError {
                    errors: Some(errors),
                    ..validation_failed()
                }
            },

            ServerError::UnauthorizedIp(_) | ServerError::InvalidToken => {
                ResponseError::default()
                    .status(StatusCode::UNAUTHORIZED)
                    .error(self.to_string())
            },

            ServerError::Provisioning(err) if err.is_internal() => {
                tracing::error!(error = %err, "provisioning failed");
                ResponseError::default()
                    .code(err.code())
                    .error(GENERIC_FAILURE)
            },

            ServerError::Provisioning(ProvisioningError::Directory(
                err @ DirectoryError::Transport(_),
            )) => {
                tracing::error!(error = %err, "directory service unreachable");
                ResponseError::default()
                    .status(StatusCode::OK)
                    .code(err.code())
                    .error(directory::GENERIC_MESSAGE)
            },

            ServerError::Provisioning(err) => ResponseError::default()
                .status(if err.is_invalid_input() {
                    StatusCode::UNPROCESSABLE_ENTITY
                } else {
                    StatusCode::OK
                })
                .code(err.code())
                .error(err.to_string()),

            ServerError::Sql(err) => {
                tracing::error!(error = %err, "database request failed");
                ResponseError::default()
                    .code(StatusCode::INTERNAL_SERVER_ERROR.as_u16())
                    .error(GENERIC_FAILURE)
            },
        };

        response.into_response()
    }
}
