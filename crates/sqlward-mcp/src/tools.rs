//! The three tools Sqlward exposes and their argument parsing.

use crate::error::McpError;
use crate::protocol::{CallToolParams, ToolDefinition};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

pub const EXECUTE_SQL: &str = "execute_sql";
pub const LIST_TABLES: &str = "list_tables";
pub const DESCRIBE_TABLE: &str = "describe_table";

/// A validated `tools/call`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    ExecuteSql { sql: String },
    ListTables { schema: Option<String> },
    DescribeTable { table: String, schema: Option<String> },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ExecuteSqlArgs {
    sql: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ListTablesArgs {
    #[serde(default)]
    schema: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DescribeTableArgs {
    table: String,
    #[serde(default)]
    schema: Option<String>,
}

impl ToolCall {
    pub fn parse(params: CallToolParams) -> Result<Self, McpError> {
        let CallToolParams { name, arguments } = params;
        match name.as_str() {
            EXECUTE_SQL => {
                let args: ExecuteSqlArgs = arguments_for(&name, arguments)?;
                Ok(Self::ExecuteSql { sql: args.sql })
            }
            LIST_TABLES => {
                let args: ListTablesArgs = arguments_for(&name, arguments)?;
                Ok(Self::ListTables {
                    schema: args.schema,
                })
            }
            DESCRIBE_TABLE => {
                let args: DescribeTableArgs = arguments_for(&name, arguments)?;
                Ok(Self::DescribeTable {
                    table: args.table,
                    schema: args.schema,
                })
            }
            _ => Err(McpError::UnknownTool { name }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ExecuteSql { .. } => EXECUTE_SQL,
            Self::ListTables { .. } => LIST_TABLES,
            Self::DescribeTable { .. } => DESCRIBE_TABLE,
        }
    }
}

fn arguments_for<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, McpError> {
    // Omitted arguments mean an empty object.
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| McpError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// Definitions returned by `tools/list`.
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: EXECUTE_SQL.to_string(),
            description: "Execute exactly one SQL statement in its own transaction. \
                          The statement is checked against the configured policy and \
                          guardrails first. Returns columns, rows, rows_affected and error."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "sql": { "type": "string", "description": "A single SQL statement" }
                },
                "required": ["sql"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: LIST_TABLES.to_string(),
            description: "List tables and views, optionally restricted to one schema."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "schema": { "type": "string" }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: DESCRIBE_TABLE.to_string(),
            description: "Describe the columns and primary key of one table.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "table": { "type": "string" },
                    "schema": { "type": "string" }
                },
                "required": ["table"],
                "additionalProperties": false
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: Value) -> Result<ToolCall, McpError> {
        ToolCall::parse(CallToolParams {
            name: name.to_string(),
            arguments,
        })
    }

    #[test]
    fn test_parse_each_tool() {
        assert_eq!(
            call("execute_sql", json!({"sql": "SELECT 1"})).unwrap(),
            ToolCall::ExecuteSql {
                sql: "SELECT 1".to_string()
            }
        );
        assert_eq!(
            call("list_tables", Value::Null).unwrap(),
            ToolCall::ListTables { schema: None }
        );
        assert_eq!(
            call("describe_table", json!({"table": "users", "schema": "app"})).unwrap(),
            ToolCall::DescribeTable {
                table: "users".to_string(),
                schema: Some("app".to_string())
            }
        );
    }

    #[test]
    fn test_missing_sql_is_invalid_arguments() {
        let err = call("execute_sql", json!({})).unwrap_err();
        assert!(matches!(err, McpError::InvalidArguments { ref tool, .. } if tool == "execute_sql"));
        assert_eq!(err.code(), -32602);
    }

    #[test]
    fn test_unknown_tool() {
        let err = call("drop_everything", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "unknown tool: drop_everything");
    }

    #[test]
    fn test_definitions_match_parser() {
        let names: Vec<_> = definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec![EXECUTE_SQL, LIST_TABLES, DESCRIBE_TABLE]);
    }
}
