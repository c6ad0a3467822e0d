//! The guarded execution pipeline.
//!
//! ```text
//! admit -> before hooks -> policy -> timeout -> begin/execute -> normalize
//!       -> after hooks -> commit -> sanitize -> size cap
//! ```
//!
//! [`Pipeline::execute`] never fails: every error is rendered, augmented by
//! the diagnostic rules and returned in [`QueryResult::error`].

use sqlward_core::{CallContext, ConfigError, Done, QueryResult, Row, SqlwardConfig};
use sqlward_hooks::GuardrailChain;
use sqlward_policy::PolicyEngine;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::admission::AdmissionPool;
use crate::backend::{Backend, Execution, TableInfo, TableSchema, Transaction, TxOptions};
use crate::diagnostics::DiagnosticMatcher;
use crate::error::ExecuteError;
use crate::normalize::normalize;
use crate::sanitize::Sanitizer;
use crate::timeout::TimeoutSelector;

/// Appended to the cut-down payload when a result is over the size limit.
pub const TRUNCATION_SUFFIX: &str = "... [truncated: result exceeds limits.max_result_bytes]";

pub struct Pipeline<B: Backend> {
    backend: B,
    policy: PolicyEngine,
    guardrails: GuardrailChain,
    timeouts: TimeoutSelector,
    sanitizer: Sanitizer,
    diagnostics: DiagnosticMatcher,
    admission: AdmissionPool,
    max_result_bytes: usize,
}

impl<B: Backend> Pipeline<B> {
    /// Validate `config` and compile every rule set once.
    pub fn from_config(backend: B, config: &SqlwardConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let admission = AdmissionPool::new(config.admission_capacity()).map_err(|_| {
            ConfigError::ZeroValue {
                field: "limits.max_concurrency".to_string(),
            }
        })?;
        Ok(Self {
            backend,
            policy: PolicyEngine::new(config.policy.clone()),
            guardrails: GuardrailChain::from_config(&config.guardrails)?,
            timeouts: TimeoutSelector::from_config(&config.timeouts)?,
            sanitizer: Sanitizer::from_config(&config.sanitize)?,
            diagnostics: DiagnosticMatcher::from_config(&config.diagnostics)?,
            admission,
            max_result_bytes: config.limits.max_result_bytes,
        })
    }

    /// Replace the configured guardrails, e.g. with in-process ones.
    pub fn with_guardrails(mut self, guardrails: GuardrailChain) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn admission(&self) -> &AdmissionPool {
        &self.admission
    }

    /// Run one caller-supplied statement through every stage.
    pub async fn execute(&self, ctx: &CallContext, sql: &str) -> QueryResult {
        match self.run(ctx, sql).await {
            Ok(mut result) => {
                // Truncation and after-hook rewrites can leave an error on a
                // completed call.
                result.error = result.error.map(|error| self.diagnostics.augment(error));
                result
            }
            Err(err) => {
                let message = self.diagnostics.augment(err.to_string());
                debug!(error = %message, "statement failed");
                QueryResult::failed(message)
            }
        }
    }

    async fn run(&self, ctx: &CallContext, sql: &str) -> Result<QueryResult, ExecuteError> {
        let _slot = self.admission.acquire(ctx).await?;

        let sql = self.guardrails.run_before(ctx, sql.to_string()).await?;
        self.policy.check(&sql)?;

        let timeout = self.timeouts.select(&sql);
        debug!(?timeout, "statement timeout selected");
        let exec_ctx = ctx.with_timeout(timeout);
        let options = TxOptions {
            read_only: self.policy.config().read_only,
            statement_timeout: timeout,
        };

        let mut tx = bounded(&exec_ctx, timeout, self.backend.begin(&options)).await?;
        let mut result = match self.run_in_transaction(ctx, &exec_ctx, timeout, &mut tx, &sql).await
        {
            Ok(result) => result,
            Err(err) => {
                rollback(ctx, tx).await;
                return Err(err);
            }
        };
        bounded(ctx, timeout, tx.commit()).await?;
        debug!(rows = result.rows.len(), rows_affected = result.rows_affected, "committed");

        self.sanitizer.sanitize_rows(&mut result.rows);
        self.apply_size_cap(&mut result)?;
        Ok(result)
    }

    async fn run_in_transaction(
        &self,
        ctx: &CallContext,
        exec_ctx: &CallContext,
        timeout: Duration,
        tx: &mut B::Tx,
        sql: &str,
    ) -> Result<QueryResult, ExecuteError> {
        let execution = bounded(exec_ctx, timeout, tx.execute(sql)).await?;
        let result = to_result(execution);

        if !self.guardrails.has_after_hooks() {
            return Ok(result);
        }
        // serde_json keeps integers as i64/u64, so this round trip is exact.
        let serialized = serde_json::to_string(&result)?;
        let rewritten = self.guardrails.run_after(ctx, serialized).await?;
        Ok(serde_json::from_str(&rewritten)?)
    }

    fn apply_size_cap(&self, result: &mut QueryResult) -> Result<(), ExecuteError> {
        let serialized = serde_json::to_string(&result.rows)?;
        if serialized.len() <= self.max_result_bytes {
            return Ok(());
        }
        warn!(
            bytes = serialized.len(),
            limit = self.max_result_bytes,
            "result truncated"
        );
        let cut = floor_char_boundary(&serialized, self.max_result_bytes);
        result.rows.clear();
        result.error = Some(format!("{}{TRUNCATION_SUFFIX}", &serialized[..cut]));
        Ok(())
    }

    /// Tables visible to the database user. Bypasses guardrails, policy and
    /// sanitization.
    pub async fn list_tables(
        &self,
        ctx: &CallContext,
        schema: Option<&str>,
    ) -> Result<Vec<TableInfo>, ExecuteError> {
        let _slot = self.admission.acquire(ctx).await?;
        let timeout = self.timeouts.default_timeout();
        bounded(&ctx.with_timeout(timeout), timeout, self.backend.list_tables(schema)).await
    }

    pub async fn describe_table(
        &self,
        ctx: &CallContext,
        schema: Option<&str>,
        table: &str,
    ) -> Result<TableSchema, ExecuteError> {
        let _slot = self.admission.acquire(ctx).await?;
        let timeout = self.timeouts.default_timeout();
        bounded(
            &ctx.with_timeout(timeout),
            timeout,
            self.backend.describe_table(schema, table),
        )
        .await
    }
}

/// Run a backend call under `ctx`, mapping its expiry to a timeout.
async fn bounded<T>(
    ctx: &CallContext,
    timeout: Duration,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, ExecuteError> {
    match ctx.run(fut).await {
        Ok(result) => result.map_err(ExecuteError::Database),
        Err(Done::DeadlineExceeded) => Err(ExecuteError::Timeout(timeout)),
        Err(Done::Cancelled) => Err(ExecuteError::Cancelled),
    }
}

/// Roll back on the caller's context so an expired statement deadline does
/// not also abort the rollback.
async fn rollback<T: Transaction>(ctx: &CallContext, tx: T) {
    match ctx.run(tx.rollback()).await {
        Ok(Ok(())) => debug!("rolled back"),
        Ok(Err(err)) => warn!(error = %format!("{err:#}"), "rollback failed"),
        Err(done) => info!(?done, "rollback abandoned; connection will discard the transaction"),
    }
}

fn to_result(execution: Execution) -> QueryResult {
    let Execution {
        columns,
        rows,
        rows_affected,
    } = execution;
    let rows: Vec<Row> = rows
        .iter()
        .map(|values| {
            columns
                .iter()
                .cloned()
                .zip(values.iter().map(normalize))
                .collect()
        })
        .collect();
    QueryResult {
        rows_affected: rows_affected.max(rows.len() as u64),
        columns,
        rows,
        error: None,
    }
}

/// Largest index `<= max` that falls on a character boundary.
fn floor_char_boundary(text: &str, max: usize) -> usize {
    if max >= text.len() {
        return text.len();
    }
    let mut index = max;
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
