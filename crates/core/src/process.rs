//! Tool process execution.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Exit code reported when the process was terminated by a signal.
pub const SIGNALLED_EXIT_CODE: i32 = -1;

/// Environment overlay that keeps the tool from prompting.
#[must_use]
pub fn non_interactive_env() -> BTreeMap<String, String> {
    BTreeMap::from([("NONINTERACTIVE".to_string(), "1".to_string())])
}

/// Runs an executable and reports its exit code.
///
/// A nonzero exit is a normal return value. Only failing to start the
/// process is an error.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, adding `env` to the inherited environment.
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<i32>;
}

/// [`CommandRunner`] backed by `tokio::process`, inheriting stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<i32> {
        info!(program = %program.display(), ?args, "Running");

        let status = Command::new(program)
            .args(args)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| Error::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        let code = status.code().unwrap_or_else(|| {
            warn!(program = %program.display(), "Process terminated by signal");
            SIGNALLED_EXIT_CODE
        });
        debug!(program = %program.display(), code, "Process exited");
        Ok(code)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_returned() {
        let code = ProcessRunner
            .run(Path::new("/bin/sh"), &sh("exit 7"), &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(code, 7);
    }

    #[tokio::test]
    async fn test_env_overlay_is_applied() {
        let code = ProcessRunner
            .run(
                Path::new("/bin/sh"),
                &sh(r#"test "$NONINTERACTIVE" = "1""#),
                &non_interactive_env(),
            )
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = ProcessRunner
            .run(
                Path::new("/definitely/not/here/qodana"),
                &[],
                &BTreeMap::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }
}
