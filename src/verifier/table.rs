//! Disposable test table operations on a single endpoint.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use crate::db::{DbError, Endpoint, PgSession};
use crate::verifier::poll::RowReader;

/// Row operations against `table` on one endpoint.
///
/// Every call opens and drops its own session, and the whole call (connect
/// plus statement) is bounded by `op_timeout`. The table name has already
/// been checked to be a plain identifier by config validation.
#[derive(Debug, Clone)]
pub struct ScenarioTable {
    endpoint: Endpoint,
    table: String,
    op_timeout: Duration,
}

impl ScenarioTable {
    pub fn new(endpoint: Endpoint, table: impl Into<String>, op_timeout: Duration) -> Self {
        Self {
            endpoint,
            table: table.into(),
            op_timeout,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn session(&self) -> Result<PgSession, DbError> {
        PgSession::connect(&self.endpoint, self.op_timeout).await
    }

    /// A stalled statement surfaces as `DbError::Timeout`; the session is
    /// dropped with the cancelled future.
    async fn bounded<T, F>(&self, op: F) -> Result<T, DbError>
    where
        F: Future<Output = Result<T, DbError>>,
    {
        timeout(self.op_timeout, op)
            .await
            .unwrap_or(Err(DbError::Timeout(self.op_timeout)))
    }

    pub async fn ensure(&self) -> Result<(), DbError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                id SERIAL PRIMARY KEY, \
                payload TEXT NOT NULL, \
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP, \
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)",
            self.table
        );
        self.bounded(async {
            self.session().await?.client().batch_execute(&sql).await?;
            Ok::<_, DbError>(())
        })
        .await
    }

    pub async fn insert(&self, payload: &str) -> Result<i32, DbError> {
        let sql = format!("INSERT INTO {} (payload) VALUES ($1) RETURNING id", self.table);
        self.bounded(async {
            let row = self.session().await?.client().query_one(&sql, &[&payload]).await?;
            Ok::<_, DbError>(row.try_get(0)?)
        })
        .await
    }

    /// Returns the number of rows changed.
    pub async fn update(&self, row_id: i32, payload: &str) -> Result<u64, DbError> {
        let sql = format!(
            "UPDATE {} SET payload = $1, updated_at = NOW() WHERE id = $2",
            self.table
        );
        self.bounded(async {
            Ok::<_, DbError>(self.session().await?.client().execute(&sql, &[&payload, &row_id]).await?)
        })
        .await
    }

    pub async fn delete(&self, row_id: i32) -> Result<u64, DbError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table);
        self.bounded(async { Ok::<_, DbError>(self.session().await?.client().execute(&sql, &[&row_id]).await?) })
            .await
    }

    pub async fn read(&self, row_id: i32) -> Result<Option<String>, DbError> {
        let sql = format!("SELECT payload FROM {} WHERE id = $1", self.table);
        self.bounded(async {
            let row = self.session().await?.client().query_opt(&sql, &[&row_id]).await?;
            match row {
                Some(row) => Ok::<_, DbError>(Some(row.try_get(0)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Run one write statement in a transaction that is always rolled back.
    ///
    /// `Ok(rows)` means the endpoint accepted the write (nothing is kept);
    /// `Err` carries the rejection.
    pub async fn try_write(&self, probe: WriteProbe) -> Result<u64, DbError> {
        self.bounded(async {
            let mut session = self.session().await?;
            let tx = session.client_mut().transaction().await?;
            let rows = match probe {
                WriteProbe::Insert => {
                    let sql = format!("INSERT INTO {} (payload) VALUES ($1)", self.table);
                    tx.execute(&sql, &[&"write_rejection_probe"]).await?
                }
                WriteProbe::Update => {
                    let sql = format!("UPDATE {} SET payload = payload WHERE id = $1", self.table);
                    tx.execute(&sql, &[&-1i32]).await?
                }
                WriteProbe::Delete => {
                    let sql = format!("DELETE FROM {} WHERE id = $1", self.table);
                    tx.execute(&sql, &[&-1i32]).await?
                }
            };
            tx.rollback().await?;
            Ok::<_, DbError>(rows)
        })
        .await
    }
}

/// Write statements used to check that an endpoint is read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProbe {
    Insert,
    Update,
    Delete,
}

impl WriteProbe {
    pub const ALL: [WriteProbe; 3] = [WriteProbe::Insert, WriteProbe::Update, WriteProbe::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            WriteProbe::Insert => "INSERT",
            WriteProbe::Update => "UPDATE",
            WriteProbe::Delete => "DELETE",
        }
    }
}

#[async_trait]
impl RowReader for ScenarioTable {
    async fn read_payload(&self, row_id: i32) -> Result<Option<String>, DbError> {
        self.read(row_id).await
    }

    fn source(&self) -> String {
        format!("{}/{}", self.endpoint, self.table)
    }
}
