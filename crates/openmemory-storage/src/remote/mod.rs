//! Remote relational backend.
//!
//! A deadpool-managed connection pool over tokio-postgres. Table names are
//! prefixed so several deployments can share one database; every statement
//! from the shared set is rewritten through the tokenizer on the way in.

pub mod ops;
pub mod rows;

use deadpool_postgres::{Config as PgConfig, Pool, Runtime};
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row, Statement};

use openmemory_core::{OmError, OmResult};

use crate::sql;
use crate::sql::statements as st;

/// Namespace prefix for every table in shared deployments.
pub const TABLE_PREFIX: &str = "om_";

/// Read retries on connection loss, with exponential backoff.
const READ_RETRIES: u32 = 3;

/// Rewrite one shared statement into the remote dialect.
pub fn rq(sql_text: &str) -> String {
    sql::for_remote(sql_text, TABLE_PREFIX, st::TABLES)
}

pub struct RemoteBackend {
    pub pool: Pool,
}

impl RemoteBackend {
    /// Build a pool from a connection URL. Pool size comes from deadpool's
    /// default unless the URL carries an explicit setting.
    pub fn connect(url: &str) -> OmResult<Self> {
        let mut cfg = PgConfig::new();
        cfg.url = Some(url.to_string());
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| OmError::storage(format!("create pool: {e}")))?;
        Ok(Self { pool })
    }

    pub async fn client(&self) -> OmResult<deadpool_postgres::Client> {
        self.pool
            .get()
            .await
            .map_err(|e| OmError::DependencyUnavailable {
                dependency: "metadata database".into(),
                reason: e.to_string(),
            })
    }

    /// Run a read closure with bounded retries on connection loss.
    pub async fn with_read_retries<F, Fut, T>(&self, f: F) -> OmResult<T>
    where
        F: Fn(deadpool_postgres::Client) -> Fut,
        Fut: std::future::Future<Output = OmResult<T>>,
    {
        let mut attempt = 0;
        loop {
            let client = self.client().await?;
            match f(client).await {
                Err(OmError::Storage { message }) if message.contains("connection") => {
                    attempt += 1;
                    if attempt > READ_RETRIES {
                        return Err(OmError::storage(message));
                    }
                    let backoff = std::time::Duration::from_millis(50 << attempt);
                    tokio::time::sleep(backoff).await;
                }
                other => return other,
            }
        }
    }
}

/// Statement execution seam shared by pooled clients and transactions, so
/// each named operation is written once. Both implementations go through
/// deadpool's per-connection statement cache.
pub trait PgExec: Sync {
    fn stmt(
        &self,
        sql: &str,
    ) -> impl std::future::Future<Output = Result<Statement, tokio_postgres::Error>> + Send;

    fn exec(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = Result<u64, tokio_postgres::Error>> + Send;

    fn rows(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = Result<Vec<Row>, tokio_postgres::Error>> + Send;
}

impl PgExec for deadpool_postgres::Client {
    async fn stmt(&self, sql: &str) -> Result<Statement, tokio_postgres::Error> {
        self.prepare_cached(sql).await
    }

    async fn exec(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, tokio_postgres::Error> {
        self.execute(stmt, params).await
    }

    async fn rows(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        self.query(stmt, params).await
    }
}

impl PgExec for deadpool_postgres::Transaction<'_> {
    async fn stmt(&self, sql: &str) -> Result<Statement, tokio_postgres::Error> {
        self.prepare_cached(sql).await
    }

    async fn exec(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, tokio_postgres::Error> {
        self.execute(stmt, params).await
    }

    async fn rows(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        self.query(stmt, params).await
    }
}

/// Map a postgres failure into the workspace taxonomy without naming the
/// backend. Unique/constraint violations become conflicts.
pub fn map_pg_err(e: tokio_postgres::Error, ctx: &str) -> OmError {
    if let Some(db) = e.as_db_error() {
        use tokio_postgres::error::SqlState;
        let code = db.code();
        if code == &SqlState::UNIQUE_VIOLATION
            || code == &SqlState::FOREIGN_KEY_VIOLATION
            || code == &SqlState::CHECK_VIOLATION
        {
            return OmError::conflict(format!("{ctx}: constraint violation"));
        }
    }
    OmError::storage(format!("{ctx}: {e}"))
}
