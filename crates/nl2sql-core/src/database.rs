use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{record::ConnectionRecord, schema::Schema};

/// One result row keyed by column name.
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("invalid connection settings: {0}")]
    Settings(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("statement rejected: {0}")]
    Rejected(String),
}

/// Database operations the service performs against the configured endpoint.
/// Every call opens its own connection from the record it is given.
#[async_trait]
pub trait Database: Send + Sync {
    /// Open and immediately close a connection.
    async fn check(&self, record: &ConnectionRecord) -> Result<(), DatabaseError>;

    /// Read table, column and key metadata.
    async fn schema(&self, record: &ConnectionRecord) -> Result<Schema, DatabaseError>;

    /// Run a statement and collect its rows.
    async fn execute(&self, record: &ConnectionRecord, sql: &str) -> Result<Vec<Row>, DatabaseError>;
}
