use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::value::NativeValue;

/// How a transaction must be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOptions {
    pub read_only: bool,
    /// Server-side statement timeout, matching the client-side deadline.
    pub statement_timeout: Duration,
}

/// Raw output of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<NativeValue>>,
    pub rows_affected: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    /// `BASE TABLE`, `VIEW`, ...
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

/// A database the pipeline can run statements against.
#[async_trait]
pub trait Backend: Send + Sync {
    type Tx: Transaction;

    /// Open a transaction. Must honor `options.read_only`.
    async fn begin(&self, options: &TxOptions) -> anyhow::Result<Self::Tx>;

    /// Tables and views visible to the connection, optionally in one schema.
    async fn list_tables(&self, schema: Option<&str>) -> anyhow::Result<Vec<TableInfo>>;

    /// Columns and primary key of one table. `schema` defaults to the
    /// backend's search path.
    async fn describe_table(&self, schema: Option<&str>, table: &str)
    -> anyhow::Result<TableSchema>;
}

/// An open transaction. Dropping it without commit must roll back.
#[async_trait]
pub trait Transaction: Send {
    async fn execute(&mut self, sql: &str) -> anyhow::Result<Execution>;

    async fn commit(self) -> anyhow::Result<()>;

    async fn rollback(self) -> anyhow::Result<()>;
}
