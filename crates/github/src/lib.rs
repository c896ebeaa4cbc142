//! GitHub Actions host provider for qodana-ci.
//!
//! This crate provides GitHub-specific implementations of:
//! - [`GitHubInputs`] reading action inputs from `INPUT_*` variables
//! - [`GitHubCache`] for the Actions cache service
//! - [`GitHubArtifacts`] for workflow artifacts
//!
//! Both storage clients speak the results service protocol
//! (`ACTIONS_RESULTS_URL`) and move data through signed blob URLs.
//! - [`GitHubHost`] for workflow commands, `GITHUB_PATH` and job summaries
//!
//! [`context::from_env`] builds the run context from the runner environment
//! and the event payload.

pub mod artifact;
mod blob;
pub mod cache;
pub mod context;
pub mod host;
pub mod inputs;
mod results;

pub use artifact::GitHubArtifacts;
pub use cache::GitHubCache;
pub use host::GitHubHost;
pub use inputs::GitHubInputs;

use qodana_ci_core::env::EnvSnapshot;

/// Provider name used in logs and the run context.
pub const PROVIDER: &str = "github";

/// Whether the process is running inside GitHub Actions.
#[must_use]
pub fn detect(env: &EnvSnapshot) -> bool {
    env.is("GITHUB_ACTIONS", "true")
}
