//! # sqlward-core
//!
//! Types shared across all Sqlward crates:
//!
//! - [`config`]: the YAML configuration model, loading and startup validation
//! - [`CallContext`]: per-call cancellation signal and deadline
//! - [`QueryResult`]: the normalized result returned for every statement

pub mod config;
pub mod context;
pub mod duration;
pub mod error;
pub mod result;

pub use config::{
    DatabaseConfig, DiagnosticRule, GuardrailEntryConfig, GuardrailsConfig, LimitsConfig,
    McpConfig, PolicyConfig, SanitizeRule, SqlwardConfig, TimeoutRule, TimeoutsConfig,
    compile_pattern,
};
pub use context::{CallContext, Done};
pub use error::ConfigError;
pub use result::{QueryResult, Row};
