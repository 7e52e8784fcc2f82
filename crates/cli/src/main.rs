// aide CLI entry point.

use std::process::ExitCode as ProcessExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod client;
mod commands;
mod exit_code;
mod output;

use exit_code::ExitCode;

#[derive(Parser)]
#[command(
    name = "aide",
    about = "Workspace registry for directory-backed projects"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> ProcessExitCode {
    // Diagnostics go to stderr so command output stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match commands::run(cli.command) {
        Ok(()) => ExitCode::Success.into(),
        Err(error) => {
            tracing::debug!(error = ?error, "command failed");
            ExitCode::from_error(&error).into()
        }
    }
}
