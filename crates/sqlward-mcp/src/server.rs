//! MCP server implementation.
//!
//! Each request line is handled on its own task so a slow statement never
//! blocks `ping` or a `notifications/cancelled` for it. Responses funnel
//! through one channel into a single writer, which keeps every line on
//! stdout intact.

use crate::error::McpError;
use crate::protocol::*;
use crate::tools::{self, ToolCall};
use serde::Serialize;
use serde_json::{Value, json};
use sqlward_core::config::{McpConfig, Transport};
use sqlward_core::CallContext;
use sqlward_runtime::{Backend, ExecuteError, Pipeline};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const RESPONSE_BUFFER: usize = 64;

/// The MCP server.
pub struct McpServer<B: Backend> {
    pipeline: Arc<Pipeline<B>>,
    config: McpConfig,
    /// Cancellation tokens of requests still running, keyed by JSON id.
    in_flight: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl<B: Backend> Clone for McpServer<B> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            config: self.config.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<B: Backend + 'static> McpServer<B> {
    pub fn new(pipeline: Arc<Pipeline<B>>, config: McpConfig) -> Self {
        Self {
            pipeline,
            config,
            in_flight: Arc::default(),
        }
    }

    /// Serve on the configured transport until the client disconnects.
    pub async fn run(&self) -> Result<(), McpError> {
        match self.config.transport {
            Transport::Stdio => {
                tracing::info!("starting MCP server with stdio transport");
                self.serve(tokio::io::stdin(), tokio::io::stdout()).await
            }
        }
    }

    /// Read newline-delimited requests from `reader` until EOF, then wait
    /// for outstanding requests and their responses to be written.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), McpError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
        let writer_task = tokio::spawn(write_responses(writer, rx));

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_request(line) {
                Ok(request) => self.dispatch(request, &tx),
                Err((id, err)) => {
                    tracing::debug!(error = %err, "rejecting malformed message");
                    send(&tx, JsonRpcResponse::error(id, err.code(), err.to_string())).await;
                }
            }
        }

        drop(tx);
        writer_task
            .await
            .map_err(|e| McpError::Io(std::io::Error::other(e)))?
    }

    fn dispatch(&self, request: JsonRpcRequest, tx: &mpsc::Sender<JsonRpcResponse>) {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;
        if method == "notifications/cancelled" {
            self.cancel(params);
            return;
        }
        let Some(id) = id else {
            tracing::debug!(%method, "notification received");
            return;
        };

        let key = id.to_string();
        let token = CancellationToken::new();
        self.in_flight().insert(key.clone(), token.clone());

        let server = self.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let ctx = CallContext::from_token(token.clone());
            let response = server.handle_request(id, &method, params, &ctx).await;
            server.in_flight().remove(&key);
            // A cancelled request gets no response.
            if !token.is_cancelled() {
                send(&tx, response).await;
            }
        });
    }

    fn cancel(&self, params: Option<Value>) {
        let Some(params) = params.and_then(|p| serde_json::from_value::<CancelledParams>(p).ok())
        else {
            tracing::debug!("ignoring malformed cancellation");
            return;
        };
        let key = params.request_id.to_string();
        match self.in_flight().get(&key) {
            Some(token) => {
                tracing::info!(request_id = %key, reason = ?params.reason, "cancelling request");
                token.cancel();
            }
            None => tracing::debug!(request_id = %key, "cancellation for unknown request"),
        }
    }

    /// Handle one JSON-RPC request.
    pub async fn handle_request(
        &self,
        id: Value,
        method: &str,
        params: Option<Value>,
        ctx: &CallContext,
    ) -> JsonRpcResponse {
        match self.route(method, params, ctx).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => JsonRpcResponse::error(id, err.code(), err.to_string()),
        }
    }

    async fn route(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: &CallContext,
    ) -> Result<Value, McpError> {
        match method {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": self.config.server_name,
                    "version": env!("CARGO_PKG_VERSION")
                },
                "capabilities": {
                    "tools": { "listChanged": false }
                }
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tools::definitions() })),
            "tools/call" => {
                let params = params.ok_or_else(|| McpError::InvalidParams("missing params".into()))?;
                let params: CallToolParams = serde_json::from_value(params)
                    .map_err(|e| McpError::InvalidParams(e.to_string()))?;
                let call = ToolCall::parse(params)?;
                let response = self.call_tool(call, ctx).await?;
                Ok(serde_json::to_value(response)?)
            }
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    async fn call_tool(
        &self,
        call: ToolCall,
        ctx: &CallContext,
    ) -> Result<CallToolResponse, McpError> {
        tracing::debug!(tool = call.name(), "tool call");
        match call {
            ToolCall::ExecuteSql { sql } => {
                let result = self.pipeline.execute(ctx, &sql).await;
                Ok(CallToolResponse::text(
                    serde_json::to_string(&result)?,
                    result.is_error(),
                ))
            }
            ToolCall::ListTables { schema } => {
                catalog_response(self.pipeline.list_tables(ctx, schema.as_deref()).await)
            }
            ToolCall::DescribeTable { table, schema } => catalog_response(
                self.pipeline
                    .describe_table(ctx, schema.as_deref(), &table)
                    .await,
            ),
        }
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn catalog_response<T: Serialize>(
    result: Result<T, ExecuteError>,
) -> Result<CallToolResponse, McpError> {
    match result {
        Ok(value) => Ok(CallToolResponse::text(
            serde_json::to_string(&value)?,
            false,
        )),
        Err(err) => Ok(CallToolResponse::text(err.to_string(), true)),
    }
}

/// Parse one line. On failure, returns the id to answer with (null when it
/// could not be recovered) and the error.
fn parse_request(line: &str) -> Result<JsonRpcRequest, (Value, McpError)> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| (Value::Null, McpError::Parse(e)))?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = serde_json::from_value(value)
        .map_err(|e| (id.clone(), McpError::InvalidRequest(e.to_string())))?;
    if request.jsonrpc != JSONRPC_VERSION {
        return Err((
            id,
            McpError::InvalidRequest(format!("unsupported jsonrpc version {}", request.jsonrpc)),
        ));
    }
    Ok(request)
}

async fn send(tx: &mpsc::Sender<JsonRpcResponse>, response: JsonRpcResponse) {
    if tx.send(response).await.is_err() {
        tracing::warn!("response writer stopped, dropping response");
    }
}

async fn write_responses<W>(
    mut writer: W,
    mut rx: mpsc::Receiver<JsonRpcResponse>,
) -> Result<(), McpError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_string(&response)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
