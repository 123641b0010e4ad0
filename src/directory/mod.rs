//! Directory service access.

mod auth;
mod error;
mod google;
mod model;

pub use auth::*;
pub use error::*;
pub use google::*;
pub use model::*;

use async_trait::async_trait;

/// Account operations offered by the directory service.
///
/// Unsuccessful calls are classified into [`DirectoryError`].
#[async_trait]
pub trait Directory: Send + Sync {
    /// Fetch an account by primary email.
    async fn get_user(&self, email: &str) -> Result<DirectoryUser>;

    /// Create a new account.
    async fn insert_user(&self, user: &DirectoryUser) -> Result<DirectoryUser>;

    /// Apply a partial update to an account.
    async fn update_user(
        &self,
        email: &str,
        update: &UserUpdate,
    ) -> Result<DirectoryUser>;

    /// Remove an account.
    async fn delete_user(&self, email: &str) -> Result<()>;

    /// List one page of accounts.
    async fn list_users(&self, query: &ListUsers) -> Result<UserPage>;
}
