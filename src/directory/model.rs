//! Directory API resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `type` of an external ID carrying an institution-defined value.
pub const CUSTOM_TYPE: &str = "custom";

/// Account as returned by the directory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub primary_email: String,
    #[serde(default)]
    pub name: UserName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_password_at_next_login: Option<bool>,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_unit_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_ids: Vec<ExternalId>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserName {
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
}

/// Typed key/value extension field of an account.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalId {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_type: Option<String>,
    #[serde(default)]
    pub value: String,
}

impl ExternalId {
    /// Create a `custom` external ID.
    pub fn custom(custom_type: &str, value: impl Into<String>) -> Self {
        Self {
            kind: CUSTOM_TYPE.to_owned(),
            custom_type: Some(custom_type.to_owned()),
            value: value.into(),
        }
    }

    /// Whether this entry is a `custom` ID of the given custom type.
    pub fn is_custom(&self, custom_type: &str) -> bool {
        self.kind == CUSTOM_TYPE
            && self.custom_type.as_deref() == Some(custom_type)
    }
}

/// Partial update sent with `users.update`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_password_at_next_login: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ids: Option<Vec<ExternalId>>,
}

/// Parameters of `users.list`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListUsers {
    pub query: Option<String>,
    pub max_results: Option<u32>,
    pub page_token: Option<String>,
}

impl ListUsers {
    /// List every account.
    pub fn all() -> Self {
        Self::default()
    }

    /// Search accounts carrying an external ID equal to `value`.
    pub fn by_external_id(value: &str) -> Self {
        Self {
            query: Some(format!("externalId:{}", quote_query_value(value))),
            ..Default::default()
        }
    }

    pub fn max_results(mut self, max: u32) -> Self {
        self.max_results = Some(max);
        self
    }

    pub fn page_token(mut self, token: Option<String>) -> Self {
        self.page_token = token;
        self
    }
}

/// One page of `users.list`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    #[serde(default)]
    pub users: Vec<DirectoryUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

fn quote_query_value(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("'{}'", value.replace('\'', "\\'"))
    } else {
        value.to_owned()
    }
}
