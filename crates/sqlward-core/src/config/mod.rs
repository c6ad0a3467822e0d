//! Configuration types for Sqlward.
//!
//! A single YAML file (`sqlward.yaml`) describes the database, the statement
//! policy, timeouts, guardrail hooks, sanitization and diagnostic rules, and
//! limits. [`SqlwardConfig::load`] parses and validates it; any error is
//! fatal at startup.

pub mod database;
pub mod guardrails;
pub mod limits;
pub mod mcp;
pub mod policy;
pub mod rules;
pub mod timeouts;

use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub use database::DatabaseConfig;
pub use guardrails::{GuardrailEntryConfig, GuardrailsConfig};
pub use limits::LimitsConfig;
pub use mcp::{McpConfig, Transport};
pub use policy::PolicyConfig;
pub use rules::{DiagnosticRule, SanitizeRule};
pub use timeouts::{TimeoutRule, TimeoutsConfig};

/// Complete Sqlward configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlwardConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub guardrails: GuardrailsConfig,

    #[serde(default)]
    pub sanitize: Vec<SanitizeRule>,

    #[serde(default)]
    pub diagnostics: Vec<DiagnosticRule>,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub mcp: McpConfig,
}

impl SqlwardConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Number of admission slots: `limits.max_concurrency` if set, else the
    /// connection pool size.
    pub fn admission_capacity(&self) -> usize {
        self.limits
            .max_concurrency
            .unwrap_or(self.database.max_connections as usize)
    }

    /// Check everything that would otherwise fail at call time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(zero("database.max_connections"));
        }
        if self.admission_capacity() == 0 {
            return Err(zero("limits.max_concurrency"));
        }
        if self.limits.max_result_bytes == 0 {
            return Err(zero("limits.max_result_bytes"));
        }
        if self.database.connect_timeout.is_zero() {
            return Err(zero("database.connect_timeout"));
        }

        match self.timeouts.default {
            None => return Err(ConfigError::MissingDefaultTimeout),
            Some(d) if d.is_zero() => return Err(zero("timeouts.default")),
            Some(_) => {}
        }
        for (i, rule) in self.timeouts.rules.iter().enumerate() {
            compile_pattern(&format!("timeouts.rules[{i}].pattern"), &rule.pattern)?;
            if rule.timeout.is_zero() {
                return Err(zero(&format!("timeouts.rules[{i}].timeout")));
            }
        }

        if let Some(d) = self.guardrails.default_timeout
            && d.is_zero()
        {
            return Err(zero("guardrails.default_timeout"));
        }
        for (phase, entries) in [
            ("before", &self.guardrails.before),
            ("after", &self.guardrails.after),
        ] {
            for (i, entry) in entries.iter().enumerate() {
                validate_guardrail(
                    &format!("guardrails.{phase}[{i}]"),
                    entry,
                    self.guardrails.default_timeout,
                )?;
            }
        }

        for (i, rule) in self.sanitize.iter().enumerate() {
            compile_pattern(&format!("sanitize[{i}].pattern"), &rule.pattern)?;
        }
        for (i, rule) in self.diagnostics.iter().enumerate() {
            compile_pattern(&format!("diagnostics[{i}].pattern"), &rule.pattern)?;
        }

        Ok(())
    }
}

/// Compile a configured pattern, naming the offending field on failure.
pub fn compile_pattern(field: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        field: field.to_string(),
        source,
    })
}

fn validate_guardrail(
    field: &str,
    entry: &GuardrailEntryConfig,
    default_timeout: Option<Duration>,
) -> Result<(), ConfigError> {
    compile_pattern(&format!("{field}.pattern"), &entry.pattern)?;
    if entry.command.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field: format!("{field}.command"),
            reason: "command must not be empty".to_string(),
        });
    }
    match entry.timeout.or(default_timeout) {
        None => Err(ConfigError::Invalid {
            field: format!("{field}.timeout"),
            reason: "no timeout set and guardrails.default_timeout is missing".to_string(),
        }),
        Some(d) if d.is_zero() => Err(zero(&format!("{field}.timeout"))),
        Some(_) => Ok(()),
    }
}

fn zero(field: &str) -> ConfigError {
    ConfigError::ZeroValue {
        field: field.to_string(),
    }
}
