//! Run context from Azure Pipelines predefined variables.
//!
//! Pull request builds only expose the target branch, so the base commit is
//! resolved with `git merge-base origin/<target> HEAD` in the checkout.

use qodana_ci_core::context::{PullRequest, RunContext, default_tool_cache_dir};
use qodana_ci_core::env::EnvSnapshot;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::PROVIDER;

/// Merge base of `origin/<target_branch>` and `HEAD` in `repo_dir`.
pub async fn merge_base(repo_dir: &Path, target_branch: &str) -> Option<String> {
    let branch = target_branch
        .strip_prefix("refs/heads/")
        .unwrap_or(target_branch);
    let upstream = format!("origin/{branch}");
    debug!(%upstream, "Resolving pull request base with git merge-base");

    let output = Command::new("git")
        .args(["merge-base", &upstream, "HEAD"])
        .current_dir(repo_dir)
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        debug!(
            "git merge-base failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

/// Build the run context from predefined variables.
///
/// The checkout is `BUILD_SOURCESDIRECTORY`, or the current directory.
pub async fn from_env(env: &EnvSnapshot) -> RunContext {
    let repo_dir = env
        .non_empty("BUILD_SOURCESDIRECTORY")
        .map_or_else(|| PathBuf::from("."), PathBuf::from);

    let pull_request = match env.non_empty("SYSTEM_PULLREQUEST_TARGETBRANCH") {
        Some(target) => match merge_base(&repo_dir, target).await {
            Some(base_sha) => Some(PullRequest {
                base_sha,
                base_ref: Some(target.to_string()),
            }),
            None => {
                warn!(
                    target,
                    "Could not resolve the pull request base commit; analysing the full project"
                );
                None
            }
        },
        None => None,
    };

    let context = RunContext {
        provider: PROVIDER.to_string(),
        ref_name: env.get("BUILD_SOURCEBRANCH").unwrap_or_default().to_string(),
        sha: env.get("BUILD_SOURCEVERSION").unwrap_or_default().to_string(),
        default_branch: env
            .non_empty("BUILD_REPOSITORY_DEFAULTBRANCH")
            .map(String::from),
        pull_request,
        server_url: env
            .non_empty("SYSTEM_COLLECTIONURI")
            .map(String::from),
        temp_dir: env
            .non_empty("AGENT_TEMPDIRECTORY")
            .map_or_else(std::env::temp_dir, PathBuf::from),
        tool_cache_dir: env
            .non_empty("AGENT_TOOLSDIRECTORY")
            .map_or_else(default_tool_cache_dir, PathBuf::from),
    };
    debug!(?context, "Resolved Azure Pipelines run context");
    context
}
