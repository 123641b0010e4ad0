//! Provisioning failures.

use thiserror::Error;

use crate::directory::DirectoryError;

pub type Result<T> = std::result::Result<T, ProvisioningError>;

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Missing required fields: firstname, lastname, domain")]
    MissingFields,

    #[error("Cannot derive a username from the supplied names")]
    InvalidName,

    #[error("Matric number '{matricno}' already belongs to {owner}")]
    MatricnoTaken { matricno: String, owner: String },

    #[error("Too many duplicate usernames")]
    TooManyDuplicates,

    #[error("User '{email}' not found")]
    UserNotFound { email: String },

    #[error("No user found with matricno '{matricno}'")]
    MatricnoNotFound { matricno: String },

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("database request failed: {0}")]
    Store(#[from] sqlx::Error),
}

impl ProvisioningError {
    /// Code reported in `error_code`.
    pub fn code(&self) -> u16 {
        match self {
            ProvisioningError::MissingFields | ProvisioningError::InvalidName => {
                422
            },
            ProvisioningError::MatricnoTaken { .. }
            | ProvisioningError::TooManyDuplicates => 409,
            ProvisioningError::UserNotFound { .. }
            | ProvisioningError::MatricnoNotFound { .. } => 404,
            ProvisioningError::Directory(err) => err.code(),
            ProvisioningError::Store(_) => 500,
        }
    }

    /// Whether the caller sent unusable fields.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            ProvisioningError::MissingFields | ProvisioningError::InvalidName
        )
    }

    /// Whether the failure comes from this service rather than the caller
    /// or the directory.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ProvisioningError::Store(_)
                | ProvisioningError::Directory(
                    DirectoryError::Credentials(_) | DirectoryError::Assertion(_)
                )
        )
    }

    /// Turn a directory not-found into [`ProvisioningError::UserNotFound`].
    pub(crate) fn user_lookup(email: &str) -> impl FnOnce(DirectoryError) -> Self {
        let email = email.to_owned();
        move |err| {
            if err.is_not_found() {
                ProvisioningError::UserNotFound { email }
            } else {
                err.into()
            }
        }
    }
}
