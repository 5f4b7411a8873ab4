//! Scoped PostgreSQL session.

use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls};

use crate::db::Endpoint;

/// Errors raised while talking to an endpoint.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("connect to {endpoint} failed: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl DbError {
    /// First line of the message, the form surfaced in status logs.
    pub fn summary(&self) -> String {
        first_line(&self.to_string())
    }

    /// The server refused a write because the session is read-only
    /// (SQLSTATE 25006), as a hot standby does.
    pub fn is_read_only_rejection(&self) -> bool {
        matches!(self, DbError::Query(e) if e.code() == Some(&SqlState::READ_ONLY_SQL_TRANSACTION))
    }
}

pub(crate) fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().trim().to_string()
}

/// A single connection to an endpoint.
///
/// The driver task is aborted when the session is dropped, so the socket is
/// released on every exit path including cancellation by an outer timeout.
pub struct PgSession {
    client: Client,
    driver: JoinHandle<()>,
}

impl PgSession {
    /// Connect with an explicit bound on the handshake.
    pub async fn connect(endpoint: &Endpoint, limit: Duration) -> Result<Self, DbError> {
        let conn_string = endpoint.conn_string();
        let (client, connection) = match timeout(limit, tokio_postgres::connect(&conn_string, NoTls)).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(source)) => {
                return Err(DbError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                })
            }
            Err(_) => return Err(DbError::Timeout(limit)),
        };

        let name = endpoint.name.clone();
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(endpoint = %name, error = %e, "Connection driver ended with error");
            }
        });

        Ok(Self { client, driver })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    /// Trivial round-trip used by the health prober.
    pub async fn ping(&self) -> Result<(), DbError> {
        self.client.simple_query("SELECT 1").await?;
        Ok(())
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
