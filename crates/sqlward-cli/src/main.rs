use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{check::CheckArgs, serve::ServeArgs, validate::ValidateArgs};

#[derive(Parser, Debug)]
#[command(name = "sqlward", version, about = "Guarded SQL execution gateway for AI agents")]
struct Cli {
    /// Log filter used when RUST_LOG is not set (e.g. "debug", "sqlward_runtime=trace").
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server on stdio.
    Serve(ServeArgs),

    /// Run one statement through the policy engine without executing it.
    Check(CheckArgs),

    /// Load and validate a configuration file.
    Validate(ValidateArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.cmd {
        Command::Serve(args) => commands::serve::run(args).await?,
        Command::Check(args) => {
            if !commands::check::run(args)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Validate(args) => commands::validate::run(args)?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Logs go to stderr: stdout belongs to the MCP transport.
fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
