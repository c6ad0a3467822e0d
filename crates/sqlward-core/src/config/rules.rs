//! Result sanitization and error diagnostic rules.

use serde::{Deserialize, Serialize};

/// Replace every match of `pattern` in string result values.
///
/// `replacement` uses `regex` expansion syntax (`$1`, `${name}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizeRule {
    pub pattern: String,
    pub replacement: String,
}

/// Attach `message` to any surfaced error whose text matches `pattern`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticRule {
    pub pattern: String,
    pub message: String,
}
