//! Statement timeout rules.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout selection: first matching rule wins, otherwise `default`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Fallback timeout. Mandatory; there is no built-in value.
    #[serde(default, with = "crate::duration::option")]
    pub default: Option<Duration>,

    /// Rules evaluated in declared order.
    #[serde(default)]
    pub rules: Vec<TimeoutRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutRule {
    /// Regular expression matched against the SQL text.
    pub pattern: String,

    #[serde(with = "crate::duration")]
    pub timeout: Duration,
}
