//! Drives the server over in-memory pipes with a fake backend.

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{Value, json};
use sqlward_core::{QueryResult, SqlwardConfig};
use sqlward_mcp::McpServer;
use sqlward_runtime::{
    Backend, Execution, NativeValue, Pipeline, TableInfo, TableSchema, Transaction, TxOptions,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

const SLOW: &str = "SELECT pg_sleep(60)";

struct FakeBackend;

struct FakeTx;

#[async_trait]
impl Backend for FakeBackend {
    type Tx = FakeTx;

    async fn begin(&self, _options: &TxOptions) -> anyhow::Result<FakeTx> {
        Ok(FakeTx)
    }

    async fn list_tables(&self, schema: Option<&str>) -> anyhow::Result<Vec<TableInfo>> {
        Ok(vec![TableInfo {
            schema: schema.unwrap_or("public").to_string(),
            name: "orders".to_string(),
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
        if sql == SLOW {
            std::future::pending::<()>().await;
        }
        Ok(Execution {
            columns: vec!["n".to_string()],
            rows: vec![vec![NativeValue::Int(1)]],
            rows_affected: 0,
        })
    }

    async fn commit(self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn rollback(self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Feed `requests` as input lines and collect responses by id.
async fn exchange(requests: &[Value]) -> HashMap<String, Value> {
    let input: String = requests.iter().map(|r| format!("{r}\n")).collect();
    exchange_raw(&input).await
}

async fn exchange_raw(input: &str) -> HashMap<String, Value> {
    let mut config = SqlwardConfig::default();
    config.timeouts.default = Some(Duration::from_secs(30));
    config.mcp.server_name = "sqlward-test".to_string();

    let pipeline = Arc::new(Pipeline::from_config(FakeBackend, &config).unwrap());
    let server = McpServer::new(pipeline, config.mcp.clone());

    let (mut client, server_side) = tokio::io::duplex(1 << 16);
    server.serve(input.as_bytes(), server_side).await.unwrap();

    let mut output = String::new();
    client.read_to_string(&mut output).await.unwrap();
    output
        .lines()
        .map(|line| {
            let response: Value = serde_json::from_str(line).unwrap();
            (response["id"].to_string(), response)
        })
        .collect()
}

fn call(id: u64, tool: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": tool, "arguments": arguments }
    })
}

fn tool_text(response: &Value) -> (String, bool) {
    let result = &response["result"];
    (
        result["content"][0]["text"].as_str().unwrap().to_string(),
        result["isError"].as_bool().unwrap(),
    )
}

#[tokio::test]
async fn test_initialize_and_list_tools() {
    let responses = exchange(&[
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}),
    ])
    .await;

    assert_eq!(responses.len(), 3, "notifications get no response");
    assert_eq!(
        responses["1"]["result"]["serverInfo"]["name"],
        json!("sqlward-test")
    );
    let names: Vec<_> = responses["2"]["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["execute_sql", "list_tables", "describe_table"]);
    assert_eq!(responses["3"]["result"], json!({}));
}

#[tokio::test]
async fn test_protocol_errors() {
    let responses =
        exchange_raw("{\"jsonrpc\": \"2.0\", \"id\": \n{broken\n{\"jsonrpc\":\"2.0\",\"id\":5,\"method\":\"resources/list\"}\n")
            .await;
    assert_eq!(responses["null"]["error"]["code"], json!(-32700));
    assert_eq!(responses["5"]["error"]["code"], json!(-32601));
}

#[tokio::test]
async fn test_execute_sql_returns_query_result() {
    let responses = exchange(&[call(1, "execute_sql", json!({"sql": "SELECT 1 AS n"}))]).await;
    let (text, is_error) = tool_text(&responses["1"]);
    assert!(!is_error);

    let result: QueryResult = serde_json::from_str(&text).unwrap();
    assert_eq!(result.columns, vec!["n"]);
    assert_eq!(result.rows[0]["n"], json!(1));
    assert_eq!(result.rows_affected, 1);
}

#[tokio::test]
async fn test_policy_rejection_sets_is_error() {
    let responses = exchange(&[call(1, "execute_sql", json!({"sql": "DELETE FROM orders"}))]).await;
    let (text, is_error) = tool_text(&responses["1"]);
    assert!(is_error);
    let result: QueryResult = serde_json::from_str(&text).unwrap();
    assert!(result.error.unwrap().contains("without WHERE"));
}

#[tokio::test]
async fn test_bad_arguments_are_invalid_params() {
    let responses = exchange(&[
        call(1, "execute_sql", json!({"query": "SELECT 1"})),
        call(2, "no_such_tool", json!({})),
    ])
    .await;
    assert_eq!(responses["1"]["error"]["code"], json!(-32602));
    assert_eq!(responses["2"]["error"]["code"], json!(-32602));
}

#[tokio::test]
async fn test_catalog_tools() {
    let responses = exchange(&[
        call(1, "list_tables", json!({"schema": "sales"})),
        call(2, "describe_table", json!({"table": "missing"})),
    ])
    .await;

    let (text, is_error) = tool_text(&responses["1"]);
    assert!(!is_error);
    let tables: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(tables[0]["schema"], json!("sales"));

    let (text, is_error) = tool_text(&responses["2"]);
    assert!(is_error);
    assert!(text.contains("does not exist"));
}

#[tokio::test]
async fn test_cancelled_request_gets_no_response() {
    let responses = exchange(&[
        call(7, "execute_sql", json!({"sql": SLOW})),
        json!({
            "jsonrpc": "2.0",
            "method": "notifications/cancelled",
            "params": { "requestId": 7, "reason": "user aborted" }
        }),
        json!({"jsonrpc": "2.0", "id": 8, "method": "ping"}),
    ])
    .await;

    assert!(!responses.contains_key("7"));
    assert!(responses.contains_key("8"));
}
