//! Guardrail failures.

use std::process::ExitStatus;
use thiserror::Error;

/// Every way a guardrail can stop a call. All of them are fatal to the call.
#[derive(Debug, Error)]
pub enum GuardrailError {
    /// The guardrail answered `accept: false`. Displays the guardrail's own
    /// message so callers see exactly what it said.
    #[error("{message}")]
    Rejected { name: String, message: String },

    /// The process could not be started.
    #[error("failed to start guardrail {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the process output failed.
    #[error("guardrail {name} I/O failure: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The process exited unsuccessfully.
    #[error("guardrail {name} failed with {status}: {stderr}")]
    Failed {
        name: String,
        status: ExitStatus,
        stderr: String,
    },

    /// The process did not answer before its deadline and was killed.
    #[error("guardrail {name} timed out")]
    Timeout { name: String },

    /// The process answered with something other than a decision object.
    #[error("guardrail {name} returned an invalid response: {source}")]
    InvalidResponse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The caller gave up while the guardrail was running.
    #[error("guardrail {name} cancelled")]
    Cancelled { name: String },
}

impl GuardrailError {
    /// Name of the guardrail that produced the error.
    pub fn guardrail(&self) -> &str {
        match self {
            Self::Rejected { name, .. }
            | Self::Spawn { name, .. }
            | Self::Io { name, .. }
            | Self::Failed { name, .. }
            | Self::Timeout { name }
            | Self::InvalidResponse { name, .. }
            | Self::Cancelled { name } => name,
        }
    }
}
