//! Admin SDK Directory API adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::auth::{ServiceAccount, ServiceAccountKey};
use super::error::{Result, classify};
use super::model::{DirectoryUser, ListUsers, UserPage, UserUpdate};
use super::Directory;
use crate::config::Directory as DirectoryConfig;

/// Directory backed by the Admin SDK over HTTPS.
pub struct GoogleDirectory {
    http: Client,
    credentials: ServiceAccount,
    base_url: String,
    customer: String,
}

impl GoogleDirectory {
    /// Create a new [`GoogleDirectory`] from configuration.
    pub fn new(config: &DirectoryConfig) -> Result<Self> {
        let key = ServiceAccountKey::from_file(&config.credentials)?;
        let credentials = ServiceAccount::new(key, &config.subject)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;

        tracing::info!(subject = %config.subject, "directory client ready");

        Ok(Self {
            http,
            credentials,
            base_url: config.base_url.clone(),
            customer: config.customer.clone(),
        })
    }

    fn user_url(&self, user_key: &str) -> String {
        format!("{}/users/{}", self.base_url, encode_segment(user_key))
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.credentials.token(&self.http).await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn send(builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            let err = classify(status, &body);
            tracing::warn!(%status, error = %err, "directory call failed");
            Err(err)
        }
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        Ok(Self::send(builder).await?.json().await?)
    }
}

#[async_trait]
impl Directory for GoogleDirectory {
    async fn get_user(&self, email: &str) -> Result<DirectoryUser> {
        let builder = self.request(Method::GET, &self.user_url(email)).await?;
        Self::send_json(builder).await
    }

    async fn insert_user(&self, user: &DirectoryUser) -> Result<DirectoryUser> {
        let url = format!("{}/users", self.base_url);
        let builder = self.request(Method::POST, &url).await?.json(user);
        Self::send_json(builder).await
    }

    async fn update_user(
        &self,
        email: &str,
        update: &UserUpdate,
    ) -> Result<DirectoryUser> {
        let builder = self
            .request(Method::PUT, &self.user_url(email))
            .await?
            .json(update);
        Self::send_json(builder).await
    }

    async fn delete_user(&self, email: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &self.user_url(email)).await?;
        Self::send(builder).await?;
        Ok(())
    }

    async fn list_users(&self, query: &ListUsers) -> Result<UserPage> {
        let url = format!("{}/users", self.base_url);
        let mut params = vec![("customer", self.customer.clone())];
        if let Some(q) = &query.query {
            params.push(("query", q.clone()));
        }
        if let Some(max) = query.max_results {
            params.push(("maxResults", max.to_string()));
        }
        if let Some(token) = &query.page_token {
            params.push(("pageToken", token.clone()));
        }

        let builder = self.request(Method::GET, &url).await?.query(&params);
        Self::send_json(builder).await
    }
}

/// Percent-encode a path segment.
fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
