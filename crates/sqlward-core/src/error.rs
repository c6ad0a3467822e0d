//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
///
/// Any of these at startup is fatal: the process must not accept calls.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid YAML for the expected shape.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// `timeouts.default` has no built-in value and must be configured.
    #[error("timeouts.default is required")]
    MissingDefaultTimeout,

    /// A duration, size or capacity that must be positive is zero.
    #[error("{field} must be greater than zero")]
    ZeroValue { field: String },

    /// A pattern did not compile.
    #[error("invalid pattern in {field}: {source}")]
    InvalidPattern {
        field: String,
        source: regex::Error,
    },

    /// Any other structural problem.
    #[error("invalid configuration at {field}: {reason}")]
    Invalid { field: String, reason: String },
}
