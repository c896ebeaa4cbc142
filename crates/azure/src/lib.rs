//! Azure Pipelines host provider for qodana-ci.
//!
//! Azure Pipelines has no cache service reachable from a task in this
//! integration, so the cache capability is
//! [`qodana_ci_core::cache::UnsupportedCache`]. Everything else goes
//! through `##vso[...]` logging commands ([`commands`]).

pub mod artifact;
pub mod commands;
pub mod context;
pub mod host;
pub mod inputs;

pub use artifact::AzureArtifacts;
pub use commands::LoggingCommands;
pub use host::AzureHost;
pub use inputs::AzureInputs;

use qodana_ci_core::env::EnvSnapshot;

/// Provider name used in logs and the run context.
pub const PROVIDER: &str = "azure";

/// Whether the process is running inside an Azure Pipelines job.
#[must_use]
pub fn detect(env: &EnvSnapshot) -> bool {
    env.is("TF_BUILD", "True")
}
