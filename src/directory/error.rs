//! Directory service errors and their classification.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Message used when the upstream body cannot be parsed.
pub const GENERIC_MESSAGE: &str =
    "An error occurred while contacting the directory service.";

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    RateLimited { message: String },

    #[error("{message}")]
    InvalidArgument { message: String },

    #[error("{message}")]
    AlreadyExists { message: String },

    #[error("{message}")]
    PermissionDenied { code: u16, message: String },

    #[error("{message}")]
    Upstream { code: u16, message: String },

    #[error("directory request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid service account credentials: {0}")]
    Credentials(String),

    #[error("cannot sign token assertion: {0}")]
    Assertion(#[from] jsonwebtoken::errors::Error),
}

impl DirectoryError {
    /// HTTP-like code reported to callers.
    pub fn code(&self) -> u16 {
        match self {
            DirectoryError::NotFound { .. } => 404,
            DirectoryError::RateLimited { .. } => 429,
            DirectoryError::InvalidArgument { .. } => 400,
            DirectoryError::AlreadyExists { .. } => 409,
            DirectoryError::PermissionDenied { code, .. }
            | DirectoryError::Upstream { code, .. } => *code,
            DirectoryError::Transport(err) => {
                err.status().map(|s| s.as_u16()).unwrap_or(503)
            },
            DirectoryError::Credentials(_) | DirectoryError::Assertion(_) => {
                500
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::NotFound { .. })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: Option<u16>,
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorReason>,
}

#[derive(Debug, Deserialize)]
struct ErrorReason {
    reason: Option<String>,
}

/// Map an unsuccessful directory response to a [`DirectoryError`].
///
/// The directory nests its failure as `{"error": {"code", "message",
/// "errors": [{"reason"}]}}`. When the body is not in that shape the
/// response status is kept and the message is generic.
pub fn classify(status: StatusCode, body: &str) -> DirectoryError {
    let detail = serde_json::from_str::<ErrorBody>(body).ok().map(|b| b.error);

    let code = detail
        .as_ref()
        .and_then(|d| d.code)
        .unwrap_or_else(|| status.as_u16());
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| GENERIC_MESSAGE.to_owned());
    let has_reason = |wanted: &[&str]| {
        detail.as_ref().is_some_and(|d| {
            d.errors
                .iter()
                .filter_map(|e| e.reason.as_deref())
                .any(|r| wanted.contains(&r))
        })
    };

    if code == 404 || has_reason(&["notFound", "resourceNotFound"]) {
        DirectoryError::NotFound { message }
    } else if code == 429
        || has_reason(&[
            "rateLimitExceeded",
            "userRateLimitExceeded",
            "quotaExceeded",
        ])
    {
        DirectoryError::RateLimited { message }
    } else if code == 409 || has_reason(&["duplicate"]) {
        DirectoryError::AlreadyExists { message }
    } else if code == 400 || has_reason(&["invalid", "required"]) {
        DirectoryError::InvalidArgument { message }
    } else if code == 401 || code == 403 {
        DirectoryError::PermissionDenied { code, message }
    } else {
        DirectoryError::Upstream { code, message }
    }
}
