use crate::cli::CliError;
use crate::providers::Session;

/// Print the resolved run context.
pub fn execute(session: &Session) -> Result<(), CliError> {
    super::print_json(&session.context)
}
