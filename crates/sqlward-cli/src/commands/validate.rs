//! `sqlward validate`: load the config and print what it will enforce.

use anyhow::Result;
use clap::Args;
use sqlward_core::SqlwardConfig;
use std::fmt::Write as _;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Configuration file path.
    #[arg(short, long, default_value = "sqlward.yaml", env = "SQLWARD_CONFIG")]
    pub config: PathBuf,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let config = super::load_config(&args.config)?;
    println!("{} is valid", args.config.display());
    print!("{}", summary(&config));
    Ok(())
}

fn summary(config: &SqlwardConfig) -> String {
    let mut out = String::new();
    let toggles = config.policy.enabled_toggles();
    let _ = writeln!(out, "  database:         {}", config.database.redacted_target());
    let _ = writeln!(out, "  read_only:        {}", config.policy.read_only);
    let _ = writeln!(
        out,
        "  enabled toggles:  {}",
        if toggles.is_empty() {
            "none".to_string()
        } else {
            toggles.join(", ")
        }
    );
    let _ = writeln!(
        out,
        "  default timeout:  {:?} ({} rules)",
        config.timeouts.default.unwrap_or_default(),
        config.timeouts.rules.len()
    );
    let _ = writeln!(
        out,
        "  guardrails:       {} before, {} after",
        config.guardrails.before.len(),
        config.guardrails.after.len()
    );
    let _ = writeln!(
        out,
        "  rules:            {} sanitize, {} diagnostics",
        config.sanitize.len(),
        config.diagnostics.len()
    );
    let _ = writeln!(out, "  admission slots:  {}", config.admission_capacity());
    let _ = writeln!(out, "  max result bytes: {}", config.limits.max_result_bytes);
    out
}
