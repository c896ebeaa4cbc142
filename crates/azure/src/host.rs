//! Agent commands for the task itself.

use qodana_ci_core::Result;
use qodana_ci_core::host::RunnerHost;
use qodana_ci_core::pipeline::RunReport;
use qodana_ci_core::summary::render_markdown;
use std::path::{Path, PathBuf};

use crate::PROVIDER;
use crate::commands::LoggingCommands;

/// File name of the uploaded markdown summary.
pub const SUMMARY_FILE: &str = "qodana-summary.md";

/// Azure Pipelines agent host.
pub struct AzureHost {
    commands: LoggingCommands,
    summary_dir: PathBuf,
}

impl AzureHost {
    /// Host issuing `commands`, writing summaries under `summary_dir`.
    #[must_use]
    pub fn new(commands: LoggingCommands, summary_dir: impl Into<PathBuf>) -> Self {
        Self {
            commands,
            summary_dir: summary_dir.into(),
        }
    }
}

impl RunnerHost for AzureHost {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn add_to_path(&self, dir: &Path) -> Result<()> {
        self.commands
            .issue("task.prependpath", &[], &dir.display().to_string())
    }

    fn report_failure(&self, message: &str) -> Result<()> {
        self.commands
            .issue("task.logissue", &[("type", "error")], message)?;
        self.commands
            .issue("task.complete", &[("result", "Failed")], message)
    }

    fn publish_summary(&self, report: &RunReport) -> Result<()> {
        std::fs::create_dir_all(&self.summary_dir)?;
        let path = self.summary_dir.join(SUMMARY_FILE);
        std::fs::write(&path, render_markdown(report))?;
        self.commands
            .issue("task.uploadsummary", &[], &path.display().to_string())
    }
}
