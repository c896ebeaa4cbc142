//! Run context resolved from the CI host.
//!
//! Host providers build a [`RunContext`] once per run; argument building,
//! cache keys and default-branch checks read it instead of the environment.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Pull request the run is evaluating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    /// Commit the pull request is based on.
    pub base_sha: String,
    /// Target branch of the pull request, if known.
    pub base_ref: Option<String>,
}

/// Context information about the current CI run.
///
/// Everything the pipeline needs from the host environment is resolved into
/// this struct once, by the host provider, and passed explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunContext {
    /// The CI provider name (e.g., "github", "azure").
    pub provider: String,
    /// The git ref being built (e.g., "refs/heads/main").
    pub ref_name: String,
    /// The git commit SHA.
    pub sha: String,
    /// The repository default branch, if the host exposes it.
    pub default_branch: Option<String>,
    /// Present when the run evaluates a pull request.
    pub pull_request: Option<PullRequest>,
    /// Host server URL (e.g., "https://github.com").
    pub server_url: Option<String>,
    /// Runner temp directory.
    pub temp_dir: PathBuf,
    /// Root of the host's tool cache.
    pub tool_cache_dir: PathBuf,
}

impl RunContext {
    /// Context with only a provider name and directories; used outside CI.
    #[must_use]
    pub fn local(temp_dir: PathBuf) -> Self {
        Self {
            provider: "local".to_string(),
            ref_name: String::new(),
            sha: String::new(),
            default_branch: None,
            pull_request: None,
            server_url: None,
            temp_dir,
            tool_cache_dir: default_tool_cache_dir(),
        }
    }

    /// Branch name of the current ref, without `refs/heads/`.
    #[must_use]
    pub fn branch(&self) -> &str {
        strip_branch_prefix(&self.ref_name)
    }

    /// Whether the current ref is the repository default branch.
    ///
    /// `false` when the default branch is unknown.
    #[must_use]
    pub fn is_default_branch(&self) -> bool {
        self.default_branch
            .as_deref()
            .is_some_and(|default| strip_branch_prefix(default) == self.branch())
    }
}

impl fmt::Display for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} ({})",
            self.provider,
            self.ref_name,
            &self.sha.get(..7).unwrap_or(&self.sha)
        )
    }
}

fn strip_branch_prefix(r: &str) -> &str {
    r.strip_prefix("refs/heads/").unwrap_or(r)
}

/// Default tool cache root, `~/.cache/qodana-ci/tools`.
#[must_use]
pub fn default_tool_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("qodana-ci")
        .join("tools")
}
