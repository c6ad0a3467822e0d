//! CLI command implementations.

pub mod check;
pub mod serve;
pub mod validate;

use anyhow::{Context, Result};
use sqlward_core::SqlwardConfig;
use std::path::Path;

pub(crate) fn load_config(path: &Path) -> Result<SqlwardConfig> {
    SqlwardConfig::load(path).with_context(|| format!("invalid configuration {}", path.display()))
}
