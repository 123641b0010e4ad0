//! Configuration manager for the provisioner.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable overriding `security.api_key`.
pub const API_TOKEN_ENV: &str = "API_ACCESS_TOKEN";
/// Hard cap on a single backfill batch.
pub const MAX_BACKFILL_BATCH: u32 = 1000;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// HTTP listener.
    #[serde(default)]
    pub server: Server,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to the directory service (Admin SDK).
    #[serde(skip_serializing)]
    pub directory: Option<Directory>,
    /// Access gate.
    #[serde(default, skip_serializing)]
    pub security: Security,
    /// Bulk attribute backfill.
    #[serde(default)]
    pub backfill: Backfill,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    /// Socket address to bind.
    pub address: String,
    /// Timeout, in seconds, for regular routes.
    pub request_timeout: u64,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8080".into(),
            request_timeout: 30,
        }
    }
}

impl Server {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Directory service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Directory {
    /// Path to the service-account JSON key.
    pub credentials: PathBuf,
    /// Administrator impersonated by the service account.
    pub subject: String,
    /// Customer identifier used for listings.
    pub customer: String,
    /// Root of the Directory API.
    pub base_url: String,
    /// Timeout, in seconds, of a single API call.
    pub timeout: u64,
}

impl Default for Directory {
    fn default() -> Self {
        Self {
            credentials: PathBuf::from("credentials.json"),
            subject: String::default(),
            customer: "my_customer".into(),
            base_url: "https://admin.googleapis.com/admin/directory/v1".into(),
            timeout: 30,
        }
    }
}

/// IP allowlist and shared-secret gate.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Security {
    /// Expected value of the `X-API-KEY` header.
    pub api_key: Option<String>,
    /// Read the client address from `X-Forwarded-For`.
    pub trust_forwarded_for: bool,
}

/// Backfill defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backfill {
    pub session: String,
    pub apptype: String,
    /// Programme written on every backfilled account.
    pub programme: String,
    /// Records per batch, capped to [`MAX_BACKFILL_BATCH`].
    pub limit: u32,
    /// Timeout, in seconds, of the backfill route.
    pub timeout: u64,
}

impl Default for Backfill {
    fn default() -> Self {
        Self {
            session: "2024/2025".into(),
            apptype: "UGD".into(),
            programme: "Undergraduate".into(),
            limit: MAX_BACKFILL_BATCH,
            timeout: 600,
        }
    }
}

impl Backfill {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let mut config: Configuration =
                    match serde_yaml::from_reader(file) {
                        Ok(config) => config,
                        Err(err) => {
                            return Ok(Arc::new(self.error(err)));
                        },
                    };

                config.version = VERSION.to_owned();
                config.backfill.limit =
                    config.backfill.limit.min(MAX_BACKFILL_BATCH);

                if let Some(directory) = config.directory.as_mut() {
                    directory.base_url = Url::parse(&directory.base_url)?
                        .as_str()
                        .trim_end_matches('/')
                        .to_owned();
                }

                if let Ok(token) = std::env::var(API_TOKEN_ENV) {
                    config.security.api_key = Some(token);
                }

                Ok(Arc::new(config))
            },
            Err(err) => Ok(Arc::new(self.error(err))),
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found");
        Self {
            version: VERSION.to_owned(),
            security: Security {
                api_key: std::env::var(API_TOKEN_ENV).ok(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
