//! Run orchestration.
//!
//! acquire → restore cache → pull → scan → (upload results ∥ save cache)
//!
//! Acquisition and `pull` failures abort the run. A failing scan is
//! reported through [`RunReport::exit_code`] and the post-steps still run.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::args::{ArgsRequest, Invocation, ScanMode};
use crate::artifact::{ArtifactBridge, ArtifactProvider};
use crate::cache::{CacheBridge, CacheKey, CachePolicy, CacheProvider};
use crate::context::RunContext;
use crate::host::{RunnerHost, ToolInstaller};
use crate::inputs::Inputs;
use crate::outcome::{RestoreOutcome, StepOutcome};
use crate::platform::Platform;
use crate::process::{CommandRunner, non_interactive_env};
use crate::{Error, Result};

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Exit code of `qodana scan`.
    pub exit_code: i32,
    /// The tool invocations that were run.
    pub invocation: Invocation,
    /// Where the reports were written.
    pub results_dir: PathBuf,
    /// What the cache restore did.
    pub cache_restore: RestoreOutcome,
    /// What the cache save did.
    pub cache_save: StepOutcome,
    /// What the results upload did.
    pub artifact: StepOutcome,
}

impl RunReport {
    /// Whether the scan succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Capabilities of the host a pipeline runs on.
pub struct Host<'a> {
    /// Downloads and verifies the tool.
    pub installer: &'a dyn ToolInstaller,
    /// Runs the tool.
    pub runner: &'a dyn CommandRunner,
    /// Cache service.
    pub cache: &'a dyn CacheProvider,
    /// Artifact service.
    pub artifacts: &'a dyn ArtifactProvider,
    /// Path, failure and summary commands.
    pub runner_host: &'a dyn RunnerHost,
}

/// One qodana run.
pub struct Pipeline<'a> {
    inputs: &'a Inputs,
    context: &'a RunContext,
    platform: Platform,
    host: Host<'a>,
    explicit_args: Option<Vec<String>>,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline.
    #[must_use]
    pub fn new(inputs: &'a Inputs, context: &'a RunContext, platform: Platform, host: Host<'a>) -> Self {
        Self {
            inputs,
            context,
            platform,
            host,
            explicit_args: None,
        }
    }

    /// Use `args` verbatim for the scan instead of deriving them.
    #[must_use]
    pub fn with_explicit_args(mut self, args: Vec<String>) -> Self {
        self.explicit_args = Some(args);
        self
    }

    /// The argument vectors this pipeline will run.
    #[must_use]
    pub fn invocation(&self) -> Invocation {
        Invocation::build(&ArgsRequest {
            user_args: &self.inputs.args,
            results_dir: &self.inputs.results_dir,
            cache_dir: &self.inputs.cache_dir,
            mode: ScanMode::resolve(self.inputs.pr_mode, self.context),
            explicit: self.explicit_args.as_deref(),
        })
    }

    /// Run all stages.
    ///
    /// # Errors
    ///
    /// Fails on acquisition errors, when the tool cannot be started, and
    /// when `qodana pull` exits nonzero.
    pub async fn run(&self) -> Result<RunReport> {
        info!(context = %self.context, platform = %self.platform, "Starting qodana run");

        let tool = self.host.installer.install(&self.platform).await?;
        if let Some(dir) = tool.parent() {
            self.host.runner_host.add_to_path(dir)?;
        }

        std::fs::create_dir_all(&self.inputs.results_dir)?;
        std::fs::create_dir_all(&self.inputs.cache_dir)?;

        let invocation = self.invocation();
        let cache = CacheBridge::new(
            self.host.cache,
            CachePolicy::from_inputs(self.inputs),
            CacheKey::for_run(self.inputs, self.context),
            vec![self.inputs.cache_dir.clone()],
        );
        let artifacts = ArtifactBridge::new(
            self.host.artifacts,
            self.inputs.upload_result,
            self.inputs.artifact_name.clone(),
        );

        let cache_restore = cache.restore().await;

        let env = non_interactive_env();
        let pull_code = self.host.runner.run(&tool, &invocation.pull, &env).await?;
        if pull_code != 0 {
            return Err(Error::PullFailed {
                exit_code: pull_code,
            });
        }

        let exit_code = self.host.runner.run(&tool, &invocation.scan, &env).await?;
        if exit_code == 0 {
            info!("Scan completed successfully");
        } else {
            warn!(exit_code, "Scan failed; uploading available results");
        }

        let (artifact, cache_save) = tokio::join!(
            artifacts.upload_results(&self.inputs.results_dir),
            cache.save(self.context, &cache_restore),
        );

        let report = RunReport {
            exit_code,
            invocation,
            results_dir: self.inputs.results_dir.clone(),
            cache_restore,
            cache_save,
            artifact,
        };

        if self.inputs.use_annotations
            && let Err(e) = self.host.runner_host.publish_summary(&report)
        {
            warn!("Failed to publish run summary: {e}");
        }

        info!(
            exit_code = report.exit_code,
            cache_restore = %report.cache_restore,
            cache_save = %report.cache_save,
            artifact = %report.artifact,
            "Qodana run finished"
        );
        Ok(report)
    }
}
