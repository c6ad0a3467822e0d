//! `sqlward serve`: connect, build the pipeline and serve MCP on stdio.

use anyhow::{Context, Result};
use clap::Args;
use sqlward_adapter_pg::PostgresBackend;
use sqlward_mcp::McpServer;
use sqlward_runtime::Pipeline;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Configuration file path.
    #[arg(short, long, default_value = "sqlward.yaml", env = "SQLWARD_CONFIG")]
    pub config: PathBuf,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let config = super::load_config(&args.config)?;

    let backend = PostgresBackend::connect(&config.database)
        .await
        .with_context(|| format!("failed to connect to {}", config.database.redacted_target()))?;
    let pipeline = Pipeline::from_config(backend, &config)?;

    info!(
        database = %config.database.redacted_target(),
        read_only = config.policy.read_only,
        admission_slots = config.admission_capacity(),
        before_hooks = config.guardrails.before.len(),
        after_hooks = config.guardrails.after.len(),
        "sqlward ready"
    );

    let server = McpServer::new(Arc::new(pipeline), config.mcp.clone());
    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }
    Ok(())
}
