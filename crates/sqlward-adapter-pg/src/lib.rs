//! # sqlward-adapter-pg
//!
//! PostgreSQL implementation of the [`Backend`] seam. Statements are
//! prepared once to learn their result columns, then executed inside a
//! transaction that carries the server-side statement timeout. Values are
//! read in the binary wire format and decoded by type OID (see [`wire`]).

use async_trait::async_trait;
use sqlward_core::DatabaseConfig;
use sqlward_runtime::{Backend, Execution, TableInfo, TableSchema, Transaction, TxOptions};
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::{Column, Executor, Statement};

mod decode;
pub mod introspect;
pub mod wire;

pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Open the connection pool described by `config`.
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.connection_string())
            .await?;
        tracing::info!(
            target = %config.redacted_target(),
            max_connections = config.max_connections,
            "connected to postgres"
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// A transaction on one pooled connection. Dropping it rolls back.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Backend for PostgresBackend {
    type Tx = PgTransaction;

    async fn begin(&self, options: &TxOptions) -> anyhow::Result<PgTransaction> {
        let mut tx = self.pool.begin().await?;
        if options.read_only {
            sqlx::query("set transaction read only")
                .execute(&mut *tx)
                .await?;
        }
        let millis = options.statement_timeout.as_millis().max(1);
        sqlx::query(&format!("set local statement_timeout = {millis}"))
            .execute(&mut *tx)
            .await?;
        Ok(PgTransaction { tx })
    }

    async fn list_tables(&self, schema: Option<&str>) -> anyhow::Result<Vec<TableInfo>> {
        introspect::list_tables(&self.pool, schema).await
    }

    async fn describe_table(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> anyhow::Result<TableSchema> {
        introspect::describe_table(&self.pool, schema, table).await
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn execute(&mut self, sql: &str) -> anyhow::Result<Execution> {
        let statement = (&mut *self.tx).prepare(sql).await?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        if columns.is_empty() {
            let done = statement.query().execute(&mut *self.tx).await?;
            return Ok(Execution {
                columns,
                rows: Vec::new(),
                rows_affected: done.rows_affected(),
            });
        }

        let rows = statement.query().fetch_all(&mut *self.tx).await?;
        let decoded = rows
            .iter()
            .map(decode::decode_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Execution {
            columns,
            rows_affected: decoded.len() as u64,
            rows: decoded,
        })
    }

    async fn commit(self) -> anyhow::Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> anyhow::Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
