//! Subcommand implementations.

mod args;
mod detect;
mod run;

use qodana_ci_core::env::EnvSnapshot;
use serde::Serialize;
use std::io::Write;
use tracing::Instrument;

use crate::cli::{Cli, CliError, Commands, EXIT_OK, HostKind};
use crate::providers::Session;
use crate::tracing::command_span;

/// Execute the parsed command line, returning the process exit code.
pub async fn execute(cli: Cli, env: EnvSnapshot) -> Result<i32, CliError> {
    let kind = HostKind::resolve(cli.platform, &env)?;
    let name = match &cli.command {
        Commands::Run { .. } => "run",
        Commands::Args { .. } => "args",
        Commands::Detect => "detect",
    };

    async move {
        let session = Session::resolve(kind, env).await?;
        match cli.command {
            Commands::Run { args } => run::execute(&session, cli.releases_url.as_deref(), args).await,
            Commands::Args { args } => {
                args::execute(&session, args)?;
                Ok(EXIT_OK)
            }
            Commands::Detect => {
                detect::execute(&session)?;
                Ok(EXIT_OK)
            }
        }
    }
    .instrument(command_span(name))
    .await
}

/// Write `value` as pretty JSON to stdout.
fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)
        .map_err(qodana_ci_core::Error::from)?;
    writeln!(out).map_err(qodana_ci_core::Error::from)?;
    Ok(())
}
