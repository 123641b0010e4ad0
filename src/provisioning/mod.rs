//! Account provisioning workflow.

mod attributes;
mod error;
pub mod password;
pub mod username;

pub use attributes::*;
pub use error::*;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::{
    Directory, DirectoryUser, ListUsers, UserName, UserPage, UserUpdate,
};
use crate::store::{
    BackfillFilter, ProvisioningLog, RequestLog, STATUS_CREATED, Store,
};

/// Page size used when walking listings.
const LIST_PAGE_SIZE: u32 = 500;

/// Fields of an account to create.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub firstname: String,
    pub lastname: String,
    pub othername: Option<String>,
    pub domain: String,
    pub password: Option<String>,
    pub matricno: Option<String>,
    pub programme: Option<String>,
    pub session: Option<String>,
}

/// Address and initial password of a created account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatedAccount {
    pub email: String,
    pub password: String,
}

/// Projection of a directory account.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub primary_email: String,
    pub given_name: String,
    pub family_name: String,
    pub middle_name: String,
    pub id: Option<String>,
    pub org_unit_path: Option<String>,
    pub suspended: bool,
    pub last_login_time: Option<DateTime<Utc>>,
    pub matricno: Option<String>,
    pub programme: Option<String>,
    pub session: Option<String>,
}

impl From<DirectoryUser> for AccountProfile {
    fn from(user: DirectoryUser) -> Self {
        let attributes = StudentAttributes::extract(&user.external_ids);

        Self {
            primary_email: user.primary_email,
            given_name: user.name.given_name,
            family_name: user.name.family_name,
            middle_name: user.name.middle_name.unwrap_or_default(),
            id: user.id,
            org_unit_path: user.org_unit_path,
            suspended: user.suspended,
            last_login_time: user.last_login_time,
            matricno: attributes.matricno,
            programme: attributes.programme,
            session: attributes.session,
        }
    }
}

/// Outcome of one backfill batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BackfillReport {
    /// Records selected.
    pub processed: usize,
    /// Records linked and marked.
    pub updated: usize,
    pub failed: usize,
    pub failures: Vec<BackfillFailure>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BackfillFailure {
    pub id: i64,
    pub email: String,
    pub error: String,
}

/// Provisioning operations over an injected directory and store.
#[derive(Clone)]
pub struct ProvisioningService {
    directory: Arc<dyn Directory>,
    store: Arc<dyn Store>,
}

impl ProvisioningService {
    /// Create a new [`ProvisioningService`].
    pub fn new(directory: Arc<dyn Directory>, store: Arc<dyn Store>) -> Self {
        Self { directory, store }
    }

    /// Create an account with a unique address derived from the names.
    pub async fn create_user(&self, request: NewAccount) -> Result<CreatedAccount> {
        let firstname = request.firstname.trim();
        let lastname = request.lastname.trim();
        let domain = username::normalize_domain(&request.domain);
        if firstname.is_empty() || lastname.is_empty() || domain.is_empty() {
            return Err(ProvisioningError::MissingFields);
        }
        let othername = non_empty(request.othername.as_deref());

        let attributes = StudentAttributes {
            matricno: non_empty(request.matricno.as_deref()).map(str::to_owned),
            programme: non_empty(request.programme.as_deref()).map(str::to_owned),
            session: non_empty(request.session.as_deref()).map(str::to_owned),
        };

        if let Some(matricno) = attributes.matricno.as_deref() {
            if let Some(owner) = self.find_by_attribute(MATRICNO, matricno).await? {
                return Err(ProvisioningError::MatricnoTaken {
                    matricno: matricno.to_owned(),
                    owner: owner.primary_email,
                });
            }
        }

        let local = username::base_local_part(firstname, othername, lastname)
            .ok_or(ProvisioningError::InvalidName)?;
        let email = self.free_address(&local, &domain).await?;

        let password = non_empty(request.password.as_deref())
            .map(str::to_owned)
            .unwrap_or_else(password::generate);

        let user = DirectoryUser {
            primary_email: email.clone(),
            name: UserName {
                given_name: firstname.to_owned(),
                family_name: lastname.to_owned(),
                middle_name: othername.map(str::to_owned),
            },
            password: Some(password.clone()),
            change_password_at_next_login: Some(true),
            external_ids: attributes.to_external_ids(),
            ..Default::default()
        };

        let created = self.directory.insert_user(&user).await?;
        metrics::counter!("directory_accounts_created_total").increment(1);
        tracing::info!(%email, "account created");

        let entry = ProvisioningLog {
            domain,
            firstname: firstname.to_owned(),
            lastname: lastname.to_owned(),
            othername: othername.map(str::to_owned),
            email: email.clone(),
            password: password.clone(),
            matric: attributes.matricno,
            programme: attributes.programme,
            session: attributes.session,
            status: STATUS_CREATED,
            created_at: Utc::now(),
        };
        if let Err(err) = self.store.log_provisioning(&entry).await {
            tracing::error!(%email, error = %err, "provisioning log not saved");
        }

        let log = RequestLog::new(
            serde_json::to_value(&request).unwrap_or_default(),
            serde_json::to_value(&created).unwrap_or_default(),
        );
        if let Err(err) = self.store.log_request(&log).await {
            tracing::error!(%email, error = %err, "request log not saved");
        }

        Ok(CreatedAccount { email, password })
    }

    /// Set a new password and force its change on next login.
    pub async fn reset_password(&self, email: &str, password: &str) -> Result<()> {
        self.directory
            .get_user(email)
            .await
            .map_err(ProvisioningError::user_lookup(email))?;

        let update = UserUpdate {
            password: Some(password.to_owned()),
            change_password_at_next_login: Some(true),
            ..Default::default()
        };
        self.directory
            .update_user(email, &update)
            .await
            .map_err(ProvisioningError::user_lookup(email))?;

        tracing::info!(%email, "password reset");
        Ok(())
    }

    pub async fn get_user(&self, email: &str) -> Result<AccountProfile> {
        let user = self
            .directory
            .get_user(email)
            .await
            .map_err(ProvisioningError::user_lookup(email))?;

        Ok(user.into())
    }

    pub async fn get_user_by_matricno(&self, matricno: &str) -> Result<AccountProfile> {
        self.find_by_attribute(MATRICNO, matricno)
            .await?
            .map(AccountProfile::from)
            .ok_or_else(|| ProvisioningError::MatricnoNotFound {
                matricno: matricno.to_owned(),
            })
    }

    /// Bind registration number, programme and session to an account.
    pub async fn add_matricno_to_user(
        &self,
        email: &str,
        matricno: &str,
        programme: &str,
        session: &str,
    ) -> Result<()> {
        if let Some(owner) = self.find_by_attribute(MATRICNO, matricno).await? {
            if !owner.primary_email.eq_ignore_ascii_case(email) {
                return Err(ProvisioningError::MatricnoTaken {
                    matricno: matricno.to_owned(),
                    owner: owner.primary_email,
                });
            }
        }

        let user = self
            .directory
            .get_user(email)
            .await
            .map_err(ProvisioningError::user_lookup(email))?;

        let mut external_ids = user.external_ids;
        StudentAttributes {
            matricno: Some(matricno.to_owned()),
            programme: Some(programme.to_owned()),
            session: Some(session.to_owned()),
        }
        .merge_into(&mut external_ids);

        let update = UserUpdate {
            external_ids: Some(external_ids),
            ..Default::default()
        };
        self.directory
            .update_user(email, &update)
            .await
            .map_err(ProvisioningError::user_lookup(email))?;

        tracing::info!(%email, %matricno, "student attributes linked");
        Ok(())
    }

    pub async fn delete_user(&self, email: &str) -> Result<()> {
        self.directory
            .delete_user(email)
            .await
            .map_err(ProvisioningError::user_lookup(email))?;

        tracing::info!(%email, "account deleted");
        Ok(())
    }

    pub async fn total_users(&self) -> Result<usize> {
        self.count(ListUsers::all(), None).await
    }

    pub async fn total_users_by_session(&self, session: &str) -> Result<usize> {
        self.count(ListUsers::by_external_id(session), Some((SESSION, session)))
            .await
    }

    pub async fn total_users_by_programme(&self, programme: &str) -> Result<usize> {
        self.count(
            ListUsers::by_external_id(programme),
            Some((PROGRAMME, programme)),
        )
        .await
    }

    /// Link attributes for a batch of pending student records.
    ///
    /// Records are handled one after another. A failing record is logged and
    /// left unmarked, and the batch carries on.
    pub async fn backfill(
        &self,
        filter: &BackfillFilter,
        programme: &str,
    ) -> Result<BackfillReport> {
        let records = self.store.pending_records(filter).await?;
        let mut report = BackfillReport {
            processed: records.len(),
            ..Default::default()
        };

        for record in records {
            let outcome = match self
                .add_matricno_to_user(
                    &record.schoolemail,
                    &record.matric,
                    programme,
                    &record.activesession,
                )
                .await
            {
                Ok(()) => self
                    .store
                    .mark_processed(record.id)
                    .await
                    .map_err(ProvisioningError::from),
                Err(err) => Err(err),
            };

            match outcome {
                Ok(()) => {
                    report.updated += 1;
                    metrics::counter!("backfill_records_total", "outcome" => "updated")
                        .increment(1);
                },
                Err(err) => {
                    tracing::error!(
                        id = record.id,
                        email = %record.schoolemail,
                        error = %err,
                        "failed updating student record"
                    );
                    metrics::counter!("backfill_records_total", "outcome" => "failed")
                        .increment(1);
                    report.failures.push(BackfillFailure {
                        id: record.id,
                        email: record.schoolemail,
                        error: err.to_string(),
                    });
                },
            }
        }

        report.failed = report.failures.len();
        tracing::info!(
            processed = report.processed,
            updated = report.updated,
            failed = report.failed,
            "backfill batch finished"
        );
        Ok(report)
    }

    /// Try `local@domain`, then numbered variants, until one is free.
    async fn free_address(&self, local: &str, domain: &str) -> Result<String> {
        for candidate in username::candidates(local, domain) {
            match self.directory.get_user(&candidate).await {
                Ok(_) => continue,
                Err(err) if err.is_not_found() => return Ok(candidate),
                Err(err) => return Err(err.into()),
            }
        }

        Err(ProvisioningError::TooManyDuplicates)
    }

    /// First account carrying `value` under the custom type `kind`.
    async fn find_by_attribute(
        &self,
        kind: &str,
        value: &str,
    ) -> Result<Option<DirectoryUser>> {
        let mut page_token = None;
        loop {
            let UserPage {
                users,
                next_page_token,
            } = self
                .directory
                .list_users(
                    &ListUsers::by_external_id(value)
                        .max_results(LIST_PAGE_SIZE)
                        .page_token(page_token),
                )
                .await?;

            if let Some(user) = users
                .into_iter()
                .find(|u| has_attribute(&u.external_ids, kind, value))
            {
                return Ok(Some(user));
            }

            match next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(None),
            }
        }
    }

    /// Count accounts across every page, optionally keeping only those
    /// carrying `(kind, value)`.
    async fn count(
        &self,
        query: ListUsers,
        attribute: Option<(&str, &str)>,
    ) -> Result<usize> {
        let mut total = 0;
        let mut page_token = None;
        loop {
            let page = self
                .directory
                .list_users(
                    &query
                        .clone()
                        .max_results(LIST_PAGE_SIZE)
                        .page_token(page_token),
                )
                .await?;

            total += match attribute {
                Some((kind, value)) => page
                    .users
                    .iter()
                    .filter(|u| has_attribute(&u.external_ids, kind, value))
                    .count(),
                None => page.users.len(),
            };

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(total),
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
