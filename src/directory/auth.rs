//! Service-account access tokens.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::error::{DirectoryError, Result, classify};

/// Scope required to manage directory users.
pub const DIRECTORY_USER_SCOPE: &str =
    "https://www.googleapis.com/auth/admin.directory.user";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME: u64 = 60 * 60; // 1 hour.
/// Refresh tokens this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Subset of the service-account JSON key.
#[derive(Clone, Debug, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

impl ServiceAccountKey {
    /// Read the key from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            DirectoryError::Credentials(format!("{}: {err}", path.display()))
        })?;
        serde_json::from_str(&raw)
            .map_err(|err| DirectoryError::Credentials(err.to_string()))
    }
}

/// Claims of the JWT-bearer assertion.
#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    sub: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: SystemTime,
}

/// Issue access tokens for a service account impersonating `subject`.
pub struct ServiceAccount {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    subject: String,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccount {
    /// Create a new [`ServiceAccount`].
    pub fn new(key: ServiceAccountKey, subject: impl Into<String>) -> Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;

        Ok(Self {
            key,
            signing_key,
            subject: subject.into(),
            scope: DIRECTORY_USER_SCOPE.to_owned(),
            cached: Mutex::new(None),
        })
    }

    /// Build the signed assertion exchanged for an access token.
    fn assertion(&self, now: u64) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let claims = Claims {
            iss: &self.key.client_email,
            sub: &self.subject,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME,
        };

        Ok(encode(&header, &claims, &self.signing_key)?)
    }

    /// Return a valid access token, refreshing it when needed.
    pub async fn token(&self, http: &reqwest::Client) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at > SystemTime::now() + EXPIRY_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| DirectoryError::Credentials(err.to_string()))?
            .as_secs();
        let assertion = self.assertion(now)?;

        let response = http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "directory token exchange refused");
            return Err(classify(status, &body));
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!(expires_in = token.expires_in, "directory token refreshed");

        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: SystemTime::now() + Duration::from_secs(token.expires_in),
        });

        Ok(value)
    }
}
