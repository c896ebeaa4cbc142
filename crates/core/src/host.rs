//! Host runner capabilities that are not cache or artifact storage.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::Result;
use crate::pipeline::RunReport;
use crate::platform::Platform;

/// Commands understood by the CI runner itself.
pub trait RunnerHost: Send + Sync {
    /// Host name for logs (e.g. "github").
    fn name(&self) -> &'static str;

    /// Put `dir` on the search path of later steps.
    fn add_to_path(&self, dir: &Path) -> Result<()>;

    /// Mark the step failed with `message`.
    fn report_failure(&self, message: &str) -> Result<()>;

    /// Publish a human-readable summary of the run.
    fn publish_summary(&self, report: &RunReport) -> Result<()>;
}

/// Installs the analysis tool.
#[async_trait]
pub trait ToolInstaller: Send + Sync {
    /// Install the tool for `platform`, returning the executable path.
    ///
    /// Implementations must verify the download before returning.
    async fn install(&self, platform: &Platform) -> Result<PathBuf>;
}
