//! # sqlward-mcp
//!
//! MCP (Model Context Protocol) server that exposes the Sqlward pipeline to
//! AI agents over newline-delimited JSON-RPC 2.0 on stdio.
//!
//! | Tool | Arguments | Result |
//! |------|-----------|--------|
//! | `execute_sql` | `sql` | the query result as JSON; `isError` when it carries an error |
//! | `list_tables` | `schema?` | tables and views |
//! | `describe_table` | `table`, `schema?` | columns and primary key |
//!
//! Requests run concurrently. `notifications/cancelled` cancels the named
//! request's call context, which aborts admission waits, guardrail processes
//! and statement execution alike.

pub mod error;
pub mod protocol;
pub mod server;
pub mod tools;

pub use error::McpError;
pub use protocol::{CallToolParams, CallToolResponse, JsonRpcRequest, JsonRpcResponse, ToolDefinition};
pub use server::McpServer;
pub use tools::ToolCall;
