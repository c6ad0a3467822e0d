//! Resource limits.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Largest serialized row payload returned to the caller. Larger
    /// results are replaced by a truncated error.
    #[serde(default = "default_max_result_bytes")]
    pub max_result_bytes: usize,

    /// Admission pool capacity. Defaults to `database.max_connections`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_result_bytes: default_max_result_bytes(),
            max_concurrency: None,
        }
    }
}

fn default_max_result_bytes() -> usize {
    1024 * 1024
}
