//! In-memory directory and store used by tests.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::Response;
use http_body_util::BodyExt;

use crate::AppState;
use crate::config::Configuration;

use crate::directory::{
    self, Directory, DirectoryError, DirectoryUser, ExternalId, ListUsers,
    UserName, UserPage, UserUpdate,
};
use crate::provisioning::ProvisioningService;
use crate::store::{
    self, BackfillFilter, PendingRecord, ProvisioningLog, RequestLog, Store,
};

/// Key accepted by [`app`].
pub const API_KEY: &str = "test-api-key";
const CLIENT: [u8; 4] = [127, 0, 0, 1];

/// Router wired on fakes. Requests come from an allowlisted loopback address.
pub fn app(directory: Arc<FakeDirectory>, store: Arc<MemoryStore>) -> Router {
    store.allow_ip("127.0.0.1");
    app_at(directory, store, CLIENT)
}

/// Router wired on fakes, seen from `client`. The allowlist is left as is.
pub fn app_at(
    directory: Arc<FakeDirectory>,
    store: Arc<MemoryStore>,
    client: [u8; 4],
) -> Router {
    let mut config = Configuration::default();
    config.security.api_key = Some(API_KEY.into());

    let state = AppState {
        config: Arc::new(config),
        store: store.clone(),
        provisioning: ProvisioningService::new(directory, store),
        metrics: None,
    };

    crate::app(state).layer(MockConnectInfo(SocketAddr::from((client, 40000))))
}

/// Decode a JSON response body.
pub async fn json(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Directory call recorded by [`FakeDirectory`].
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Get(String),
    Insert(String),
    Update(String),
    Delete(String),
    List(Option<String>),
}

type ErrorFactory = Box<dyn Fn() -> DirectoryError + Send + Sync>;

/// Build an account with the given external IDs.
pub fn account(email: &str, external_ids: Vec<ExternalId>) -> DirectoryUser {
    DirectoryUser {
        id: Some(format!("id-{email}")),
        primary_email: email.to_owned(),
        name: UserName {
            given_name: "Given".into(),
            family_name: "Family".into(),
            middle_name: None,
        },
        org_unit_path: Some("/".into()),
        external_ids,
        ..Default::default()
    }
}

fn not_found() -> DirectoryError {
    DirectoryError::NotFound {
        message: "Resource Not Found: userKey".into(),
    }
}

/// Directory holding accounts in memory, keyed by lower-cased email.
pub struct FakeDirectory {
    users: Mutex<BTreeMap<String, DirectoryUser>>,
    calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<ErrorFactory>>,
    page_size: usize,
}

impl Default for FakeDirectory {
    fn default() -> Self {
        Self {
            users: Mutex::default(),
            calls: Mutex::default(),
            failure: Mutex::default(),
            page_size: 100,
        }
    }
}

impl FakeDirectory {
    pub fn with_users(users: impl IntoIterator<Item = DirectoryUser>) -> Self {
        let directory = Self::default();
        {
            let mut map = directory.users.lock().unwrap();
            for user in users {
                map.insert(user.primary_email.to_lowercase(), user);
            }
        }
        directory
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Make every following call fail.
    pub fn fail_with(
        &self,
        factory: impl Fn() -> DirectoryError + Send + Sync + 'static,
    ) {
        *self.failure.lock().unwrap() = Some(Box::new(factory));
    }

    pub fn user(&self, email: &str) -> Option<DirectoryUser> {
        self.users.lock().unwrap().get(&email.to_lowercase()).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of insert, update and delete calls.
    pub fn writes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| {
                matches!(c, Call::Insert(_) | Call::Update(_) | Call::Delete(_))
            })
            .count()
    }

    /// Number of single-account lookups.
    pub fn lookups(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Get(_)))
            .count()
    }

    fn record(&self, call: Call) -> directory::Result<()> {
        self.calls.lock().unwrap().push(call);
        match self.failure.lock().unwrap().as_ref() {
            Some(factory) => Err(factory()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn get_user(&self, email: &str) -> directory::Result<DirectoryUser> {
        self.record(Call::Get(email.to_owned()))?;
        self.user(email).ok_or_else(not_found)
    }

    async fn insert_user(
        &self,
        user: &DirectoryUser,
    ) -> directory::Result<DirectoryUser> {
        self.record(Call::Insert(user.primary_email.clone()))?;
        let mut users = self.users.lock().unwrap();
        let key = user.primary_email.to_lowercase();
        if users.contains_key(&key) {
            return Err(DirectoryError::AlreadyExists {
                message: "Entity already exists.".into(),
            });
        }

        let mut stored = user.clone();
        stored.id = Some(format!("id-{key}"));
        users.insert(key, stored.clone());
        stored.password = None;
        Ok(stored)
    }

    async fn update_user(
        &self,
        email: &str,
        update: &UserUpdate,
    ) -> directory::Result<DirectoryUser> {
        self.record(Call::Update(email.to_owned()))?;
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&email.to_lowercase()).ok_or_else(not_found)?;

        if let Some(password) = &update.password {
            user.password = Some(password.clone());
        }
        if let Some(change) = update.change_password_at_next_login {
            user.change_password_at_next_login = Some(change);
        }
        if let Some(ids) = &update.external_ids {
            user.external_ids = ids.clone();
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, email: &str) -> directory::Result<()> {
        self.record(Call::Delete(email.to_owned()))?;
        self.users
            .lock()
            .unwrap()
            .remove(&email.to_lowercase())
            .map(|_| ())
            .ok_or_else(not_found)
    }

    async fn list_users(&self, query: &ListUsers) -> directory::Result<UserPage> {
        self.record(Call::List(query.query.clone()))?;

        let wanted = query.query.as_deref().map(|q| {
            q.trim_start_matches("externalId:")
                .trim_matches('\'')
                .to_owned()
        });
        let matching: Vec<DirectoryUser> = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| match &wanted {
                Some(value) => u.external_ids.iter().any(|id| &id.value == value),
                None => true,
            })
            .cloned()
            .collect();

        let size = query
            .max_results
            .map(|max| (max as usize).min(self.page_size))
            .unwrap_or(self.page_size);
        let start: usize = query
            .page_token
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0);
        let end = (start + size).min(matching.len());

        Ok(UserPage {
            users: matching[start.min(end)..end].to_vec(),
            next_page_token: (end < matching.len()).then(|| end.to_string()),
        })
    }
}

#[derive(Clone, Debug)]
struct StoredRecord {
    record: PendingRecord,
    apptype: String,
    processed: bool,
}

/// Store keeping rows in memory.
#[derive(Default)]
pub struct MemoryStore {
    allowed_ips: Mutex<BTreeSet<String>>,
    provisioning: Mutex<Vec<ProvisioningLog>>,
    requests: Mutex<Vec<RequestLog>>,
    records: Mutex<Vec<StoredRecord>>,
    fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn allow_ip(&self, ip: &str) {
        self.allowed_ips.lock().unwrap().insert(ip.to_owned());
    }

    /// Make every following audit insert fail.
    pub fn fail_writes(&self) {
        *self.fail_writes.lock().unwrap() = true;
    }

    pub fn add_record(
        &self,
        id: i64,
        email: &str,
        matric: &str,
        session: &str,
        apptype: &str,
    ) {
        self.records.lock().unwrap().push(StoredRecord {
            record: PendingRecord {
                id,
                schoolemail: email.to_owned(),
                matric: matric.to_owned(),
                activesession: session.to_owned(),
            },
            apptype: apptype.to_owned(),
            processed: false,
        });
    }

    pub fn provisioning_logs(&self) -> Vec<ProvisioningLog> {
        self.provisioning.lock().unwrap().clone()
    }

    pub fn request_logs(&self) -> Vec<RequestLog> {
        self.requests.lock().unwrap().clone()
    }

    pub fn processed_ids(&self) -> Vec<i64> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.processed)
            .map(|r| r.record.id)
            .collect()
    }

    fn check_write(&self) -> store::Result<()> {
        if *self.fail_writes.lock().unwrap() {
            Err(sqlx::Error::PoolTimedOut)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn is_ip_allowed(&self, ip: &str) -> store::Result<bool> {
        Ok(self.allowed_ips.lock().unwrap().contains(ip))
    }

    async fn log_provisioning(&self, entry: &ProvisioningLog) -> store::Result<()> {
        self.check_write()?;
        self.provisioning.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn log_request(&self, entry: &RequestLog) -> store::Result<()> {
        self.check_write()?;
        self.requests.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn pending_records(
        &self,
        filter: &BackfillFilter,
    ) -> store::Result<Vec<PendingRecord>> {
        let mut records: Vec<PendingRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                !r.processed
                    && r.record.activesession == filter.session
                    && r.apptype == filter.apptype
            })
            .map(|r| r.record.clone())
            .collect();
        records.sort_by_key(|r| r.id);
        records.truncate(filter.limit as usize);
        Ok(records)
    }

    async fn mark_processed(&self, id: i64) -> store::Result<()> {
        if let Some(row) = self
            .records
            .lock()
            .unwrap()
            .iter_mut()
            .find(|r| r.record.id == id)
        {
            row.processed = true;
        }
        Ok(())
    }
}
