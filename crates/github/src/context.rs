//! Run context from the GitHub Actions environment.

use qodana_ci_core::Result;
use qodana_ci_core::context::{PullRequest, RunContext, default_tool_cache_dir};
use qodana_ci_core::env::EnvSnapshot;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::PROVIDER;

/// The parts of the workflow event payload we read.
#[derive(Debug, Default, Deserialize)]
struct Event {
    pull_request: Option<PullRequestEvent>,
    repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
struct PullRequestEvent {
    base: BaseRef,
}

#[derive(Debug, Deserialize)]
struct BaseRef {
    sha: String,
    #[serde(rename = "ref")]
    ref_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    default_branch: Option<String>,
}

fn read_event(path: &Path) -> Result<Event> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Build the run context from runner variables and `GITHUB_EVENT_PATH`.
///
/// An unreadable event payload is logged and treated as a push without a
/// known default branch.
#[must_use]
pub fn from_env(env: &EnvSnapshot) -> RunContext {
    let event = env
        .non_empty("GITHUB_EVENT_PATH")
        .map(Path::new)
        .map_or_else(Event::default, |path| {
            read_event(path).unwrap_or_else(|e| {
                warn!(path = %path.display(), "Failed to read event payload: {e}");
                Event::default()
            })
        });

    let pull_request = event.pull_request.map(|pr| PullRequest {
        base_sha: pr.base.sha,
        base_ref: pr.base.ref_name,
    });

    let context = RunContext {
        provider: PROVIDER.to_string(),
        ref_name: env.get("GITHUB_REF").unwrap_or_default().to_string(),
        sha: env.get("GITHUB_SHA").unwrap_or_default().to_string(),
        default_branch: event.repository.and_then(|r| r.default_branch),
        pull_request,
        server_url: env.non_empty("GITHUB_SERVER_URL").map(String::from),
        temp_dir: env
            .non_empty("RUNNER_TEMP")
            .map_or_else(std::env::temp_dir, PathBuf::from),
        tool_cache_dir: env
            .non_empty("RUNNER_TOOL_CACHE")
            .map_or_else(default_tool_cache_dir, PathBuf::from),
    };
    debug!(?context, "Resolved GitHub run context");
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_context() {
        let env: EnvSnapshot = [
            ("GITHUB_REF", "refs/heads/main"),
            ("GITHUB_SHA", "0123456789abcdef"),
            ("GITHUB_SERVER_URL", "https://github.com"),
            ("RUNNER_TEMP", "/home/runner/work/_temp"),
            ("RUNNER_TOOL_CACHE", "/opt/hostedtoolcache"),
        ]
        .into_iter()
        .collect();

        let ctx = from_env(&env);
        assert_eq!(ctx.provider, "github");
        assert_eq!(ctx.ref_name, "refs/heads/main");
        assert_eq!(ctx.sha, "0123456789abcdef");
        assert!(ctx.pull_request.is_none());
        assert_eq!(ctx.server_url.as_deref(), Some("https://github.com"));
        assert_eq!(ctx.temp_dir, PathBuf::from("/home/runner/work/_temp"));
        assert_eq!(ctx.tool_cache_dir, PathBuf::from("/opt/hostedtoolcache"));
    }

    #[test]
    fn test_pull_request_event() {
        let dir = tempfile::tempdir().unwrap();
        let event = dir.path().join("event.json");
        std::fs::write(
            &event,
            r#"{
                "action": "synchronize",
                "pull_request": {
                    "number": 7,
                    "base": {"ref": "main", "sha": "basesha"},
                    "head": {"ref": "feature", "sha": "headsha"}
                },
                "repository": {"full_name": "acme/app", "default_branch": "main"}
            }"#,
        )
        .unwrap();

        let env: EnvSnapshot = [
            ("GITHUB_REF", "refs/pull/7/merge"),
            ("GITHUB_EVENT_PATH", event.to_str().unwrap()),
        ]
        .into_iter()
        .collect();

        let ctx = from_env(&env);
        assert_eq!(
            ctx.pull_request,
            Some(PullRequest {
                base_sha: "basesha".into(),
                base_ref: Some("main".into()),
            })
        );
        assert_eq!(ctx.default_branch.as_deref(), Some("main"));
        assert!(!ctx.is_default_branch());
    }

    #[test]
    fn test_unreadable_event_is_ignored() {
        let env: EnvSnapshot = [("GITHUB_EVENT_PATH", "/nonexistent/event.json")]
            .into_iter()
            .collect();
        let ctx = from_env(&env);
        assert!(ctx.pull_request.is_none());
        assert!(ctx.default_branch.is_none());
    }
}
