//! Audit log and student-records persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, sqlx::Error>;

/// Status written on a provisioning log entry for a created account.
pub const STATUS_CREATED: i16 = 1;

/// Append-only record of a created account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningLog {
    pub domain: String,
    pub firstname: String,
    pub lastname: String,
    pub othername: Option<String>,
    pub email: String,
    pub password: String,
    pub matric: Option<String>,
    pub programme: Option<String>,
    pub session: Option<String>,
    pub status: i16,
    pub created_at: DateTime<Utc>,
}

/// Append-only record of a request and the directory answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestLog {
    pub payload: serde_json::Value,
    pub response: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl RequestLog {
    /// Create a new [`RequestLog`], removing any `password` from `payload`.
    pub fn new(mut payload: serde_json::Value, response: serde_json::Value) -> Self {
        if let Some(object) = payload.as_object_mut() {
            object.remove("password");
        }

        Self {
            payload,
            response,
            created_at: Utc::now(),
        }
    }
}

/// Student record waiting for its attributes to be linked.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PendingRecord {
    pub id: i64,
    pub schoolemail: String,
    pub matric: String,
    pub activesession: String,
}

/// Selection of pending records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackfillFilter {
    pub session: String,
    pub apptype: String,
    pub limit: u32,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Whether `ip` appears in the allowlist.
    async fn is_ip_allowed(&self, ip: &str) -> Result<bool>;

    /// Save a [`ProvisioningLog`].
    async fn log_provisioning(&self, entry: &ProvisioningLog) -> Result<()>;

    /// Save a [`RequestLog`].
    async fn log_request(&self, entry: &RequestLog) -> Result<()>;

    /// Oldest unprocessed records matching `filter`, at most `filter.limit`.
    async fn pending_records(
        &self,
        filter: &BackfillFilter,
    ) -> Result<Vec<PendingRecord>>;

    /// Flag a record as processed.
    async fn mark_processed(&self, id: i64) -> Result<()>;
}
