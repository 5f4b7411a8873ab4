//! Database endpoints and scoped connections.
//!
//! Every probe and verifier call opens its own session and drops it on every
//! exit path. Nothing here is pooled or shared between callers.

pub mod session;

use std::fmt;

use crate::config::NodeConfig;

pub use session::{DbError, PgSession};

/// A named PostgreSQL connection target. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl Endpoint {
    /// libpq-style connection string.
    pub fn conn_string(&self) -> String {
        let mut s = format!(
            "host={} port={} user={} dbname={}",
            self.host, self.port, self.user, self.dbname
        );
        if !self.password.is_empty() {
            s.push_str(&format!(" password={}", self.password));
        }
        s
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&NodeConfig> for Endpoint {
    fn from(node: &NodeConfig) -> Self {
        Self {
            name: node.name.clone(),
            host: node.host.clone(),
            port: node.port,
            user: node.user.clone(),
            password: node.password.clone(),
            dbname: node.dbname.clone(),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("addr", &self.addr())
            .field("user", &self.user)
            .field("dbname", &self.dbname)
            .finish()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.addr())
    }
}
