//! The normalized result of one statement execution.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One result row: column name to normalized value.
pub type Row = Map<String, Value>;

/// Result of executing one statement.
///
/// Built once per call, mutated in place by each pipeline stage and returned.
/// Callers branch only on `error`: when it is set the call failed and the
/// other fields carry whatever was known at that point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in result order.
    #[serde(default)]
    pub columns: Vec<String>,

    /// Result rows.
    #[serde(default)]
    pub rows: Vec<Row>,

    /// Affected rows; for reads, the number of rows returned.
    #[serde(default)]
    pub rows_affected: u64,

    /// Error text, already augmented with any matching diagnostics.
    #[serde(default)]
    pub error: Option<String>,
}

impl QueryResult {
    /// A result carrying only an error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
