//! MCP server configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Transport type. Only stdio is supported.
    #[serde(default)]
    pub transport: Transport,

    /// Name reported in the `initialize` handshake.
    #[serde(default = "default_server_name")]
    pub server_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Stdio,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            server_name: default_server_name(),
        }
    }
}

fn default_server_name() -> String {
    "sqlward".to_string()
}
