//! End-to-end pipeline tests against an in-memory backend.

use anyhow::anyhow;
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use sqlward_core::{CallContext, DiagnosticRule, SanitizeRule, SqlwardConfig};
use sqlward_hooks::{Guardrail, GuardrailChain, GuardrailEntry, GuardrailError, GuardrailResponse};
use sqlward_runtime::{
    Backend, Execution, NativeValue, Numeric, Pipeline, TRUNCATION_SUFFIX, TableInfo, TableSchema,
    Transaction, TxOptions,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
enum Reply {
    Rows(Execution),
    Fail(&'static str),
    Hang,
}

#[derive(Debug, Default)]
struct Log {
    begun: Vec<TxOptions>,
    executed: Vec<String>,
    committed: usize,
    rolled_back: usize,
}

#[derive(Clone, Default)]
struct FakeBackend {
    replies: Arc<HashMap<String, Reply>>,
    log: Arc<Mutex<Log>>,
}

impl FakeBackend {
    fn new(replies: impl IntoIterator<Item = (&'static str, Reply)>) -> Self {
        Self {
            replies: Arc::new(
                replies
                    .into_iter()
                    .map(|(sql, reply)| (sql.to_string(), reply))
                    .collect(),
            ),
            log: Arc::default(),
        }
    }

    fn log(&self) -> std::sync::MutexGuard<'_, Log> {
        self.log.lock().unwrap()
    }
}

struct FakeTx {
    replies: Arc<HashMap<String, Reply>>,
    log: Arc<Mutex<Log>>,
}

#[async_trait]
impl Backend for FakeBackend {
    type Tx = FakeTx;

    async fn begin(&self, options: &TxOptions) -> anyhow::Result<FakeTx> {
        self.log().begun.push(*options);
        Ok(FakeTx {
            replies: self.replies.clone(),
            log: self.log.clone(),
        })
    }

    async fn list_tables(&self, schema: Option<&str>) -> anyhow::Result<Vec<TableInfo>> {
        Ok(vec![TableInfo {
            schema: schema.unwrap_or("public").to_string(),
            name: "users".to_string(),
            kind: "BASE TABLE".to_string(),
        }])
    }

    async fn describe_table(
        &self,
        _schema: Option<&str>,
        table: &str,
    ) -> anyhow::Result<TableSchema> {
        Err(anyhow!("relation \"{table}\" does not exist"))
    }
}

#[async_trait]
impl Transaction for FakeTx {
    async fn execute(&mut self, sql: &str) -> anyhow::Result<Execution> {
        self.log.lock().unwrap().executed.push(sql.to_string());
        match self.replies.get(sql).cloned() {
            Some(Reply::Rows(execution)) => Ok(execution),
            Some(Reply::Fail(message)) => Err(anyhow!(message)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Ok(Execution::default()),
        }
    }

    async fn commit(self) -> anyhow::Result<()> {
        self.log.lock().unwrap().committed += 1;
        Ok(())
    }

    async fn rollback(self) -> anyhow::Result<()> {
        self.log.lock().unwrap().rolled_back += 1;
        Ok(())
    }
}

/// In-process guardrail answering from a closure.
struct Decide<F>(F);

#[async_trait]
impl<F> Guardrail for Decide<F>
where
    F: Fn(&str) -> GuardrailResponse + Send + Sync,
{
    fn name(&self) -> &str {
        "test"
    }

    async fn invoke(
        &self,
        _ctx: &CallContext,
        payload: &str,
    ) -> Result<GuardrailResponse, GuardrailError> {
        Ok((self.0)(payload))
    }
}

fn hook<F>(decide: F) -> GuardrailEntry
where
    F: Fn(&str) -> GuardrailResponse + Send + Sync + 'static,
{
    GuardrailEntry::new(
        Regex::new(".*").unwrap(),
        Arc::new(Decide(decide)),
        Duration::from_secs(1),
    )
}

fn config() -> SqlwardConfig {
    let mut config = SqlwardConfig::default();
    config.timeouts.default = Some(Duration::from_secs(5));
    config
}

fn pipeline(backend: &FakeBackend, config: &SqlwardConfig) -> Pipeline<FakeBackend> {
    Pipeline::from_config(backend.clone(), config).unwrap()
}

fn users() -> Reply {
    Reply::Rows(Execution {
        columns: vec!["id".to_string(), "balance".to_string(), "note".to_string()],
        rows: vec![vec![
            NativeValue::Int((1 << 53) + 1),
            NativeValue::Numeric(Numeric::Infinity),
            NativeValue::Text("ssn 123-45-6789".to_string()),
        ]],
        rows_affected: 1,
    })
}

#[tokio::test]
async fn test_select_is_normalized_and_committed() {
    let backend = FakeBackend::new([("SELECT * FROM users", users())]);
    let result = pipeline(&backend, &config())
        .execute(&CallContext::new(), "SELECT * FROM users")
        .await;

    assert_eq!(result.error, None);
    assert_eq!(result.columns, vec!["id", "balance", "note"]);
    assert_eq!(result.rows_affected, 1);
    assert_eq!(result.rows[0]["id"].as_i64(), Some((1 << 53) + 1));
    assert_eq!(result.rows[0]["balance"], json!("Infinity"));

    let log = backend.log();
    assert_eq!(log.committed, 1);
    assert_eq!(log.rolled_back, 0);
    assert_eq!(log.begun[0].statement_timeout, Duration::from_secs(5));
    assert!(!log.begun[0].read_only);
}

#[tokio::test]
async fn test_multiple_statements_rejected_before_database() {
    let backend = FakeBackend::default();
    let result = pipeline(&backend, &config())
        .execute(&CallContext::new(), "SELECT 1; SELECT 2")
        .await;
    assert!(result.error.unwrap().contains("2 statements"));
    assert!(backend.log().begun.is_empty());
}

#[tokio::test]
async fn test_unfiltered_delete_rejected() {
    let backend = FakeBackend::default();
    let result = pipeline(&backend, &config())
        .execute(&CallContext::new(), "DELETE FROM t")
        .await;
    assert!(result.error.unwrap().contains("without WHERE"));
    assert!(backend.log().executed.is_empty());
}

#[tokio::test]
async fn test_filtered_delete_reports_affected_rows() {
    let sql = "DELETE FROM t WHERE id=1";
    let backend = FakeBackend::new([(
        sql,
        Reply::Rows(Execution {
            rows_affected: 1,
            ..Default::default()
        }),
    )]);
    let result = pipeline(&backend, &config())
        .execute(&CallContext::new(), sql)
        .await;
    assert_eq!(result.error, None);
    assert_eq!(result.rows_affected, 1);
    assert_eq!(backend.log().committed, 1);
}

#[tokio::test]
async fn test_rejecting_hook_message_is_the_error() {
    let backend = FakeBackend::default();
    let pipeline = pipeline(&backend, &config()).with_guardrails(GuardrailChain::new(
        vec![hook(|_| GuardrailResponse::rejected("nope"))],
        vec![],
    ));
    let result = pipeline.execute(&CallContext::new(), "SELECT 1").await;
    assert_eq!(result.error.as_deref(), Some("nope"));
    assert!(backend.log().begun.is_empty());
}

#[tokio::test]
async fn test_hook_rejection_gets_diagnostics() {
    let mut config = config();
    config.diagnostics.push(DiagnosticRule {
        pattern: "nope".to_string(),
        message: "Hint: the audit hook refused this query.".to_string(),
    });
    let pipeline = pipeline(&FakeBackend::default(), &config).with_guardrails(
        GuardrailChain::new(vec![hook(|_| GuardrailResponse::rejected("nope"))], vec![]),
    );
    let result = pipeline.execute(&CallContext::new(), "SELECT 1").await;
    assert_eq!(
        result.error.as_deref(),
        Some("nope\n\nHint: the audit hook refused this query.")
    );
}

#[tokio::test]
async fn test_before_hook_rewrite_is_what_runs() {
    let backend = FakeBackend::new([("SELECT * FROM users", users())]);
    let pipeline = pipeline(&backend, &config()).with_guardrails(GuardrailChain::new(
        vec![hook(|_| GuardrailResponse {
            accept: true,
            modified_query: Some("SELECT * FROM users".to_string()),
            ..Default::default()
        })],
        vec![],
    ));
    let result = pipeline
        .execute(&CallContext::new(), "SELECT * FROM customers")
        .await;
    assert_eq!(result.error, None);
    assert_eq!(backend.log().executed, vec!["SELECT * FROM users"]);
}

#[tokio::test]
async fn test_rewrite_is_policy_checked() {
    let backend = FakeBackend::default();
    let pipeline = pipeline(&backend, &config()).with_guardrails(GuardrailChain::new(
        vec![hook(|_| GuardrailResponse {
            accept: true,
            modified_query: Some("DROP TABLE users".to_string()),
            ..Default::default()
        })],
        vec![],
    ));
    let result = pipeline.execute(&CallContext::new(), "SELECT 1").await;
    assert!(result.error.unwrap().starts_with("DROP blocked"));
}

#[tokio::test]
async fn test_exhausted_pool_names_capacity() {
    let mut config = config();
    config.limits.max_concurrency = Some(1);
    let pipeline = pipeline(&FakeBackend::default(), &config);
    let _busy = pipeline.admission().acquire(&CallContext::new()).await.unwrap();

    let expired = CallContext::new();
    expired.cancel();
    let result = pipeline.execute(&expired, "SELECT 1").await;
    let error = result.error.unwrap();
    assert!(error.contains("connection slots exhausted"), "{error}");
    assert!(error.contains("all 1 slots"), "{error}");
}

#[tokio::test]
async fn test_database_error_rolls_back_with_hint() {
    let mut config = config();
    config.diagnostics.push(DiagnosticRule {
        pattern: "does not exist".to_string(),
        message: "Hint: call list_tables.".to_string(),
    });
    let backend = FakeBackend::new([(
        "SELECT * FROM ghosts",
        Reply::Fail("relation \"ghosts\" does not exist"),
    )]);
    let result = pipeline(&backend, &config)
        .execute(&CallContext::new(), "SELECT * FROM ghosts")
        .await;
    assert_eq!(
        result.error.as_deref(),
        Some("relation \"ghosts\" does not exist\n\nHint: call list_tables.")
    );
    assert!(result.rows.is_empty());
    let log = backend.log();
    assert_eq!((log.committed, log.rolled_back), (0, 1));
}

#[tokio::test(start_paused = true)]
async fn test_statement_timeout_rolls_back_on_caller_context() {
    let mut config = config();
    config.timeouts.default = Some(Duration::from_millis(50));
    let backend = FakeBackend::new([("SELECT pg_sleep(60)", Reply::Hang)]);
    let result = pipeline(&backend, &config)
        .execute(&CallContext::new(), "SELECT pg_sleep(60)")
        .await;
    assert_eq!(
        result.error.as_deref(),
        Some("statement timed out after 50ms")
    );
    assert_eq!(backend.log().rolled_back, 1);
}

#[tokio::test]
async fn test_oversized_result_is_truncated_on_char_boundary() {
    let mut config = config();
    config.limits.max_result_bytes = 21;
    let backend = FakeBackend::new([(
        "SELECT note FROM notes",
        Reply::Rows(Execution {
            columns: vec!["note".to_string()],
            rows: vec![vec![NativeValue::Text("ééééééééééééééééé".to_string())]],
            rows_affected: 1,
        }),
    )]);
    let result = pipeline(&backend, &config)
        .execute(&CallContext::new(), "SELECT note FROM notes")
        .await;

    assert!(result.rows.is_empty());
    let error = result.error.unwrap();
    let preview = error.strip_suffix(TRUNCATION_SUFFIX).unwrap();
    // `[{"note":"` is 10 bytes and each é is 2, so byte 21 splits the sixth é.
    assert_eq!(preview, "[{\"note\":\"ééééé");
    assert_eq!(preview.len(), 20);
}

#[tokio::test]
async fn test_truncation_gets_diagnostics() {
    let mut config = config();
    config.limits.max_result_bytes = 8;
    config.diagnostics.push(DiagnosticRule {
        pattern: "truncated".to_string(),
        message: "Hint: add a LIMIT clause.".to_string(),
    });
    let backend = FakeBackend::new([("SELECT * FROM users", users())]);
    let result = pipeline(&backend, &config)
        .execute(&CallContext::new(), "SELECT * FROM users")
        .await;

    assert!(result.rows.is_empty());
    let error = result.error.unwrap();
    let (payload, hint) = error.split_once("\n\n").unwrap();
    assert!(payload.ends_with(TRUNCATION_SUFFIX));
    assert_eq!(hint, "Hint: add a LIMIT clause.");
    assert_eq!(backend.log().committed, 1);
}

#[tokio::test]
async fn test_after_hook_round_trip_keeps_precision() {
    let backend = FakeBackend::new([("SELECT * FROM users", users())]);
    let pipeline = pipeline(&backend, &config()).with_guardrails(GuardrailChain::new(
        vec![],
        vec![hook(|_| GuardrailResponse::accepted())],
    ));
    let result = pipeline
        .execute(&CallContext::new(), "SELECT * FROM users")
        .await;
    assert_eq!(result.rows[0]["id"].as_i64(), Some((1 << 53) + 1));
}

#[tokio::test]
async fn test_after_hook_can_rewrite_result() {
    let backend = FakeBackend::new([("SELECT * FROM users", users())]);
    let pipeline = pipeline(&backend, &config()).with_guardrails(GuardrailChain::new(
        vec![],
        vec![hook(|_| GuardrailResponse {
            accept: true,
            modified_result: Some(
                r#"{"columns":["id"],"rows":[{"id":7}],"rows_affected":1}"#.to_string(),
            ),
            ..Default::default()
        })],
    ));
    let result = pipeline
        .execute(&CallContext::new(), "SELECT * FROM users")
        .await;
    assert_eq!(result.columns, vec!["id"]);
    assert_eq!(result.rows[0]["id"], json!(7));
    assert_eq!(backend.log().committed, 1);
}

#[tokio::test]
async fn test_after_hook_rejection_rolls_back() {
    let backend = FakeBackend::new([("SELECT * FROM users", users())]);
    let pipeline = pipeline(&backend, &config()).with_guardrails(GuardrailChain::new(
        vec![],
        vec![hook(|_| GuardrailResponse::rejected("result leaks data"))],
    ));
    let result = pipeline
        .execute(&CallContext::new(), "SELECT * FROM users")
        .await;
    assert_eq!(result.error.as_deref(), Some("result leaks data"));
    let log = backend.log();
    assert_eq!((log.committed, log.rolled_back), (0, 1));
}

#[tokio::test]
async fn test_rows_are_sanitized() {
    let mut config = config();
    config.sanitize.push(SanitizeRule {
        pattern: r"\d{3}-\d{2}-\d{4}".to_string(),
        replacement: "[SSN]".to_string(),
    });
    let backend = FakeBackend::new([("SELECT * FROM users", users())]);
    let result = pipeline(&backend, &config)
        .execute(&CallContext::new(), "SELECT * FROM users")
        .await;
    assert_eq!(result.rows[0]["note"], json!("ssn [SSN]"));
}

#[tokio::test]
async fn test_read_only_mode_reaches_backend() {
    let mut config = config();
    config.policy.read_only = true;
    let backend = FakeBackend::default();
    pipeline(&backend, &config)
        .execute(&CallContext::new(), "SELECT 1")
        .await;
    assert!(backend.log().begun[0].read_only);
}

#[tokio::test]
async fn test_catalog_calls_raise() {
    let backend = FakeBackend::default();
    let pipeline = pipeline(&backend, &config());
    let tables = pipeline
        .list_tables(&CallContext::new(), None)
        .await
        .unwrap();
    assert_eq!(tables[0].name, "users");

    let err = pipeline
        .describe_table(&CallContext::new(), None, "ghosts")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}
