//! `sqlward check`: dry-run a statement against the configured policy.

use anyhow::Result;
use clap::Args;
use sqlward_core::PolicyConfig;
use sqlward_policy::{PolicyEngine, PolicyError};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Configuration file path.
    #[arg(short, long, default_value = "sqlward.yaml", env = "SQLWARD_CONFIG")]
    pub config: PathBuf,

    /// The SQL to check.
    pub sql: String,
}

/// Prints the verdict; returns whether the statement is allowed.
pub fn run(args: CheckArgs) -> Result<bool> {
    let config = super::load_config(&args.config)?;
    match verdict(&config.policy, &args.sql) {
        Ok(()) => {
            println!("allowed");
            Ok(true)
        }
        Err(err) => {
            println!("rejected: {err}");
            Ok(false)
        }
    }
}

fn verdict(policy: &PolicyConfig, sql: &str) -> Result<(), PolicyError> {
    PolicyEngine::new(policy.clone()).check(sql)
}
