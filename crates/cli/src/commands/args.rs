use crate::cli::CliError;
use crate::providers::Session;
use qodana_ci_core::args::{ArgsRequest, Invocation, ScanMode};

/// Print the invocation `run` would use.
pub fn execute(session: &Session, explicit: Vec<String>) -> Result<(), CliError> {
    let explicit = (!explicit.is_empty()).then_some(explicit);
    let invocation = Invocation::build(&ArgsRequest {
        user_args: &session.inputs.args,
        results_dir: &session.inputs.results_dir,
        cache_dir: &session.inputs.cache_dir,
        mode: ScanMode::resolve(session.inputs.pr_mode, &session.context),
        explicit: explicit.as_deref(),
    });
    super::print_json(&invocation)
}
