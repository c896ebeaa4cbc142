//! Host provider assembly.
//!
//! Resolves the run context and inputs once for the selected host and
//! builds the capability objects a [`Pipeline`] runs against.

use qodana_ci_azure::{AzureArtifacts, AzureHost, AzureInputs, LoggingCommands};
use qodana_ci_core::artifact::ArtifactProvider;
use qodana_ci_core::cache::{CacheProvider, UnsupportedCache};
use qodana_ci_core::context::RunContext;
use qodana_ci_core::env::EnvSnapshot;
use qodana_ci_core::host::RunnerHost;
use qodana_ci_core::inputs::Inputs;
use qodana_ci_core::pipeline::{Host, Pipeline};
use qodana_ci_core::platform::Platform;
use qodana_ci_core::process::ProcessRunner;
use qodana_ci_core::{Result, TOOL_NAME};
use qodana_ci_github::{GitHubArtifacts, GitHubCache, GitHubHost, GitHubInputs};
use qodana_ci_tools::QodanaInstaller;

use crate::cli::HostKind;

/// Everything known about the run before anything executes.
pub struct Session {
    pub kind: HostKind,
    pub env: EnvSnapshot,
    pub context: RunContext,
    pub inputs: Inputs,
}

impl Session {
    /// Detect the context and resolve inputs for `kind`.
    pub async fn resolve(kind: HostKind, env: EnvSnapshot) -> Result<Self> {
        let (context, inputs) = match kind {
            HostKind::Github => {
                let context = qodana_ci_github::context::from_env(&env);
                let inputs = Inputs::resolve(
                    &GitHubInputs::new(env.clone()),
                    &GitHubInputs::defaults(&context.temp_dir),
                )?;
                (context, inputs)
            }
            HostKind::Azure => {
                let context = qodana_ci_azure::context::from_env(&env).await;
                let inputs = Inputs::resolve(
                    &AzureInputs::new(env.clone()),
                    &AzureInputs::defaults(&context.temp_dir),
                )?;
                (context, inputs)
            }
        };
        Ok(Self {
            kind,
            env,
            context,
            inputs,
        })
    }

    /// Host capabilities for this session.
    pub fn components(&self, releases_url: Option<&str>) -> Result<Components> {
        let mut installer =
            QodanaInstaller::new(&self.inputs.cli_version, &self.context.tool_cache_dir)?
                .with_checksum(self.inputs.checksum.clone());
        if let Some(url) = releases_url {
            installer = installer.with_releases_url(url);
        }

        let staging = self.context.temp_dir.join(TOOL_NAME);
        let (cache, artifacts, runner_host): (
            Box<dyn CacheProvider>,
            Box<dyn ArtifactProvider>,
            Box<dyn RunnerHost>,
        ) = match self.kind {
            HostKind::Github => (
                Box::new(GitHubCache::from_env(&self.env, staging.join("cache"))),
                Box::new(GitHubArtifacts::from_env(&self.env, staging.join("artifacts"))),
                Box::new(GitHubHost::from_env(&self.env)),
            ),
            HostKind::Azure => {
                let commands = LoggingCommands::stdout();
                (
                    Box::new(UnsupportedCache),
                    Box::new(AzureArtifacts::new(commands.clone(), staging.join("artifacts"))),
                    Box::new(AzureHost::new(commands, staging)),
                )
            }
        };

        Ok(Components {
            installer,
            runner: ProcessRunner,
            cache,
            artifacts,
            runner_host,
        })
    }
}

/// Owned host capabilities.
pub struct Components {
    pub installer: QodanaInstaller,
    pub runner: ProcessRunner,
    pub cache: Box<dyn CacheProvider>,
    pub artifacts: Box<dyn ArtifactProvider>,
    pub runner_host: Box<dyn RunnerHost>,
}

impl Components {
    /// A pipeline for `session` running on these capabilities.
    pub fn pipeline<'a>(&'a self, session: &'a Session, platform: Platform) -> Pipeline<'a> {
        Pipeline::new(
            &session.inputs,
            &session.context,
            platform,
            Host {
                installer: &self.installer,
                runner: &self.runner,
                cache: self.cache.as_ref(),
                artifacts: self.artifacts.as_ref(),
                runner_host: self.runner_host.as_ref(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_github_session_uses_runner_directories() {
        let env: EnvSnapshot = [
            ("GITHUB_REF", "refs/heads/main"),
            ("GITHUB_SHA", "abc"),
            ("RUNNER_TEMP", "/runner/temp"),
            ("RUNNER_TOOL_CACHE", "/runner/tools"),
            ("INPUT_CLI-VERSION", "2024.2.5"),
        ]
        .into_iter()
        .collect();

        let session = Session::resolve(HostKind::Github, env).await.unwrap();
        assert_eq!(
            session.inputs.results_dir,
            PathBuf::from("/runner/temp/qodana/results")
        );

        let components = session.components(None).unwrap();
        assert_eq!(components.installer.version(), "2024.2.5");
        assert!(!components.cache.is_supported());
        assert_eq!(components.runner_host.name(), "github");
    }

    #[tokio::test]
    async fn test_azure_session_has_no_cache() {
        let env: EnvSnapshot = [
            ("BUILD_SOURCEBRANCH", "refs/heads/main"),
            ("AGENT_TEMPDIRECTORY", "/agent/temp"),
        ]
        .into_iter()
        .collect();

        let session = Session::resolve(HostKind::Azure, env).await.unwrap();
        assert!(session.inputs.upload_result);

        let components = session.components(Some("http://mirror.local")).unwrap();
        assert!(!components.cache.is_supported());
        assert_eq!(components.runner_host.name(), "azure");
    }

    #[tokio::test]
    async fn test_invalid_boolean_input_fails_resolution() {
        let env: EnvSnapshot = [("INPUT_PR-MODE", "maybe")].into_iter().collect();
        assert!(Session::resolve(HostKind::Github, env).await.is_err());
    }
}
