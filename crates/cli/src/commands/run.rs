use qodana_ci_core::platform::Platform;
use tracing::{error, info, warn};

use crate::cli::CliError;
use crate::providers::Session;

/// Run the full pipeline; the exit code is the scan's.
///
/// Fatal errors are reported to the runner before being returned.
pub async fn execute(
    session: &Session,
    releases_url: Option<&str>,
    explicit: Vec<String>,
) -> Result<i32, CliError> {
    let components = session.components(releases_url)?;

    let result = async {
        let platform = Platform::current()?;
        let mut pipeline = components.pipeline(session, platform);
        if !explicit.is_empty() {
            info!(args = ?explicit, "Using explicit scan arguments");
            pipeline = pipeline.with_explicit_args(explicit);
        }
        pipeline.run().await
    }
    .await;

    match result {
        Ok(report) if report.is_success() => Ok(report.exit_code),
        Ok(report) => {
            let message = format!("Qodana scan failed with exit code {}", report.exit_code);
            if let Err(e) = components.runner_host.report_failure(&message) {
                warn!("Failed to report failure to the runner: {e}");
            }
            Ok(report.exit_code)
        }
        Err(e) => {
            error!("Qodana run failed: {e}");
            if let Err(report_err) = components.runner_host.report_failure(&e.to_string()) {
                warn!("Failed to report failure to the runner: {report_err}");
            }
            Err(e.into())
        }
    }
}
