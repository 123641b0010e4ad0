//! database (db) union structure.
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::store::{
    BackfillFilter, PendingRecord, ProvisioningLog, RequestLog, Result, Store,
};

pub const DEFAULT_CREDENTIALS: &str = "postgres";
pub const DEFAULT_DATABASE_NAME: &str = "provisioner";
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// PostgreSQL-backed [`Store`].
#[derive(Clone)]
pub struct Database {
    pub postgres: PgPool,
}

impl Database {
    /// Init database connections.
    pub async fn new(
        hostname: &str,
        username: &str,
        password: &str,
        db: &str,
        pool: u32,
    ) -> Result<Self> {
        let addr = format!("postgres://{username}:{password}@{hostname}/{db}");
        let pool = PgPoolOptions::new().max_connections(pool);
        let postgres = pool.connect(&addr).await?;

        tracing::info!(%hostname, %db, "postgres connected");

        Ok(Self { postgres })
    }
}

#[async_trait]
impl Store for Database {
    async fn is_ip_allowed(&self, ip: &str) -> Result<bool> {
        let allowed: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM allowed_ips WHERE ip_address = $1)"#,
        )
        .bind(ip)
        .fetch_one(&self.postgres)
        .await?;

        Ok(allowed)
    }

    async fn log_provisioning(&self, entry: &ProvisioningLog) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO email_info
                (domain, firstname, lastname, othername, email, password, matric, programme, session, status, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
        )
        .bind(&entry.domain)
        .bind(&entry.firstname)
        .bind(&entry.lastname)
        .bind(&entry.othername)
        .bind(&entry.email)
        .bind(&entry.password)
        .bind(&entry.matric)
        .bind(&entry.programme)
        .bind(&entry.session)
        .bind(entry.status)
        .bind(entry.created_at)
        .execute(&self.postgres)
        .await?;

        Ok(())
    }

    async fn log_request(&self, entry: &RequestLog) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO email_logger (payload, response, created_at) VALUES ($1, $2, $3)"#,
        )
        .bind(&entry.payload)
        .bind(&entry.response)
        .bind(entry.created_at)
        .execute(&self.postgres)
        .await?;

        Ok(())
    }

    async fn pending_records(
        &self,
        filter: &BackfillFilter,
    ) -> Result<Vec<PendingRecord>> {
        sqlx::query_as::<_, PendingRecord>(
            r#"
            SELECT id::BIGINT AS id, schoolemail, matric, activesession
            FROM users
            WHERE isupdated = 0
                AND activesession = $1
                AND apptype = $2
                AND schoolemail IS NOT NULL
                AND matric IS NOT NULL
            ORDER BY id
            LIMIT $3
            "#,
        )
        .bind(&filter.session)
        .bind(&filter.apptype)
        .bind(i64::from(filter.limit))
        .fetch_all(&self.postgres)
        .await
    }

    async fn mark_processed(&self, id: i64) -> Result<()> {
        sqlx::query(r#"UPDATE users SET isupdated = 1 WHERE id = $1"#)
            .bind(id)
            .execute(&self.postgres)
            .await?;

        Ok(())
    }
}
