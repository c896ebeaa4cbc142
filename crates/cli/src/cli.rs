//! Command line definition and error reporting.

use clap::{Parser, Subcommand, ValueEnum};
use miette::{Diagnostic, Report};
use qodana_ci_core::env::EnvSnapshot;
use thiserror::Error;

use crate::tracing::{LogLevel, TracingFormat};

/// Successful exit code
pub const EXIT_OK: i32 = 0;
/// Fatal run error exit code
pub const EXIT_FATAL: i32 = 1;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;

/// CLI-specific error types with exit code mapping
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("CLI/configuration error: {message}")]
    #[diagnostic(code(qodana_ci::cli::config))]
    Config {
        /// What was wrong
        message: String,
        /// How to fix it
        #[help]
        help: Option<String>,
    },
    /// The run itself failed (exit code 1)
    #[error(transparent)]
    #[diagnostic(transparent)]
    Run(#[from] qodana_ci_core::Error),
}

impl CliError {
    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

/// Map an error to the process exit code.
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } | CliError::Run(qodana_ci_core::Error::Configuration { .. }) => {
            EXIT_CLI
        }
        CliError::Run(_) => EXIT_FATAL,
    }
}

/// Render an error with miette on stderr.
pub fn render_error(err: CliError) {
    let report = Report::new(err);
    #[allow(clippy::print_stderr)]
    {
        eprintln!("{report:?}");
    }
}

/// CI host a run executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HostKind {
    /// GitHub Actions
    Github,
    /// Azure Pipelines
    Azure,
}

impl HostKind {
    /// Use `requested`, or detect the host from the environment.
    pub fn resolve(requested: Option<Self>, env: &EnvSnapshot) -> Result<Self, CliError> {
        if let Some(kind) = requested {
            return Ok(kind);
        }
        if qodana_ci_github::detect(env) {
            Ok(Self::Github)
        } else if qodana_ci_azure::detect(env) {
            Ok(Self::Azure)
        } else {
            Err(CliError::config_with_help(
                "Could not detect the CI platform",
                "Run inside GitHub Actions or Azure Pipelines, or pass --platform github|azure",
            ))
        }
    }
}

/// Runs Qodana in a CI job: installs the CLI, restores caches, runs the
/// analysis and publishes results.
#[derive(Parser, Debug)]
#[command(name = "qodana-ci", version, about)]
pub struct Cli {
    /// CI platform; detected from the environment when omitted
    #[arg(long, global = true, value_enum, env = "QODANA_CI_PLATFORM")]
    pub platform: Option<HostKind>,

    /// Log verbosity; `RUST_LOG` takes precedence
    #[arg(long, global = true, value_enum, default_value = "info", env = "QODANA_CI_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "compact", env = "QODANA_CI_LOG_FORMAT")]
    pub log_format: TracingFormat,

    /// Download mirror for qodana-cli releases
    #[arg(long, global = true, env = "QODANA_CI_RELEASES_URL")]
    pub releases_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Install qodana, run pull and scan, then publish results and caches
    Run {
        /// Explicit scan arguments, used verbatim
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Print the pull and scan arguments a run would use, as JSON
    Args {
        /// Explicit scan arguments, used verbatim
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Print the detected run context as JSON
    Detect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_explicit_args() {
        let cli = Cli::try_parse_from([
            "qodana-ci",
            "--platform",
            "azure",
            "run",
            "--",
            "scan",
            "--show-report",
        ])
        .unwrap();
        assert_eq!(cli.platform, Some(HostKind::Azure));
        assert_eq!(
            cli.command,
            Commands::Run {
                args: vec!["scan".into(), "--show-report".into()]
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["qodana-ci", "detect", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, TracingFormat::Json);
        assert_eq!(cli.command, Commands::Detect);
    }

    #[test]
    fn test_host_detection() {
        let github: EnvSnapshot = [("GITHUB_ACTIONS", "true")].into_iter().collect();
        assert_eq!(HostKind::resolve(None, &github).unwrap(), HostKind::Github);

        let azure: EnvSnapshot = [("TF_BUILD", "True")].into_iter().collect();
        assert_eq!(HostKind::resolve(None, &azure).unwrap(), HostKind::Azure);

        assert_eq!(
            HostKind::resolve(Some(HostKind::Azure), &github).unwrap(),
            HostKind::Azure
        );

        let err = HostKind::resolve(None, &EnvSnapshot::default()).unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_CLI);
    }

    #[test]
    fn test_exit_codes() {
        let fatal = CliError::from(qodana_ci_core::Error::PullFailed { exit_code: 3 });
        assert_eq!(exit_code_for(&fatal), EXIT_FATAL);

        let bad_input = CliError::from(qodana_ci_core::Error::configuration("bad boolean"));
        assert_eq!(exit_code_for(&bad_input), EXIT_CLI);
    }
}
