//! qodana-ci: run Qodana inside GitHub Actions and Azure Pipelines jobs.
//!
//! ```text
//! qodana-ci run                       # install, pull, scan, publish
//! qodana-ci run -- scan --show-report # explicit scan arguments
//! qodana-ci args                      # print the computed invocations
//! qodana-ci detect                    # print the detected run context
//! ```

mod cli;
mod commands;
mod providers;
mod tracing;

use clap::Parser;
use qodana_ci_core::env::EnvSnapshot;

use crate::cli::{Cli, EXIT_FATAL, exit_code_for, render_error};
use crate::tracing::{TracingConfig, init_tracing};

fn main() {
    // NOTE: tracing may not be usable during a panic, so print directly.
    #[allow(clippy::print_stderr)]
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("qodana-ci panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = Cli::parse();
    let exit_code = run_with_tokio(cli);
    std::process::exit(exit_code);
}

/// Create the tokio runtime and run the command.
fn run_with_tokio(cli: Cli) -> i32 {
    if let Err(e) = init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.log_level.into(),
        filter: None,
    }) {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("{e:?}");
        }
        return EXIT_FATAL;
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            ::tracing::error!("Failed to create tokio runtime: {e}");
            return EXIT_FATAL;
        }
    };

    let env = EnvSnapshot::capture();
    match rt.block_on(commands::execute(cli, env)) {
        Ok(code) => code,
        Err(err) => {
            let code = exit_code_for(&err);
            render_error(err);
            code
        }
    }
}
