//! External guardrail hooks.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Guardrail processes run before and after execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardrailsConfig {
    /// Deadline for entries that do not set their own `timeout`.
    #[serde(default, with = "crate::duration::option")]
    pub default_timeout: Option<Duration>,

    /// Hooks run on the SQL text before the policy check.
    #[serde(default)]
    pub before: Vec<GuardrailEntryConfig>,

    /// Hooks run on the serialized result after execution.
    #[serde(default)]
    pub after: Vec<GuardrailEntryConfig>,
}

impl GuardrailsConfig {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}

/// One guardrail process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailEntryConfig {
    /// Name used in logs and error messages. Defaults to the command.
    #[serde(default)]
    pub name: Option<String>,

    /// Regular expression; the hook fires only when it matches the payload.
    #[serde(default = "match_everything")]
    pub pattern: String,

    /// Executable to run. Never interpreted by a shell.
    pub command: String,

    /// Fixed argument vector.
    #[serde(default)]
    pub args: Vec<String>,

    /// Per-entry deadline, overriding `default_timeout`.
    #[serde(default, with = "crate::duration::option")]
    pub timeout: Option<Duration>,
}

impl GuardrailEntryConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.command)
    }
}

fn match_everything() -> String {
    ".*".to_string()
}
