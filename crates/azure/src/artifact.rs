//! Build artifacts via `artifact.upload`.
//!
//! The results are packed into `<name>.tar.gz` under the staging directory
//! and handed to the agent. The SARIF report is additionally published as
//! `CodeAnalysisLogs`, where the SARIF viewer extension picks it up.

use async_trait::async_trait;
use qodana_ci_core::artifact::{ArtifactProvider, UploadOptions, UploadReport};
use qodana_ci_core::{Error, Result, archive};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::commands::LoggingCommands;

/// Report file published to the code analysis tab.
pub const SARIF_REPORT: &str = "qodana.sarif.json";

/// Artifact name the SARIF viewer reads.
pub const CODE_ANALYSIS_LOGS: &str = "CodeAnalysisLogs";

/// Artifact provider issuing agent logging commands.
pub struct AzureArtifacts {
    commands: LoggingCommands,
    staging_dir: PathBuf,
}

impl AzureArtifacts {
    /// Stage archives under `staging_dir`.
    #[must_use]
    pub fn new(commands: LoggingCommands, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            commands,
            staging_dir: staging_dir.into(),
        }
    }

    fn publish(&self, name: &str, path: &Path) -> Result<()> {
        self.commands.issue(
            "artifact.upload",
            &[("containerfolder", name), ("artifactname", name)],
            &path.display().to_string(),
        )
    }
}

fn entry_name(file: &Path, base_dir: &Path) -> String {
    let relative = file.strip_prefix(base_dir).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ArtifactProvider for AzureArtifacts {
    async fn upload(
        &self,
        name: &str,
        files: &[PathBuf],
        base_dir: &Path,
        options: UploadOptions,
    ) -> Result<UploadReport> {
        let mut report = UploadReport::default();
        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            if file.is_file() {
                entries.push((entry_name(file, base_dir), file.clone()));
                report.uploaded.push(file.clone());
            } else if options.continue_on_error {
                warn!(file = %file.display(), "Result file disappeared before upload");
                report.failed.push(file.clone());
            } else {
                return Err(Error::host(
                    "artifact",
                    format!("{} does not exist", file.display()),
                ));
            }
        }

        let archive_path = self.staging_dir.join(format!("{name}.tar.gz"));
        let dest = archive_path.clone();
        tokio::task::spawn_blocking(move || archive::create_tar_gz(&dest, &entries))
            .await
            .map_err(|e| Error::host("artifact", e.to_string()))??;
        self.publish(name, &archive_path)?;

        if let Some(sarif) = report
            .uploaded
            .iter()
            .find(|f| f.file_name().is_some_and(|n| n == SARIF_REPORT))
        {
            self.publish(CODE_ANALYSIS_LOGS, sarif)?;
        }

        info!(
            artifact = name,
            archive = %archive_path.display(),
            files = report.uploaded.len(),
            "Artifact published"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::Captured;

    #[tokio::test]
    async fn test_upload_stages_archive_and_sarif() {
        let results = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let sarif = results.path().join(SARIF_REPORT);
        let log = results.path().join("log.txt");
        std::fs::write(&sarif, b"{}").unwrap();
        std::fs::write(&log, b"done").unwrap();

        let captured = Captured::default();
        let artifacts = AzureArtifacts::new(captured.commands(), staging.path());
        let report = artifacts
            .upload(
                "qodana-report",
                &[log.clone(), sarif.clone()],
                results.path(),
                UploadOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(report.uploaded.len(), 2);
        let archive = staging.path().join("qodana-report.tar.gz");
        assert!(archive.is_file());
        assert_eq!(
            captured.lines(),
            vec![
                format!(
                    "##vso[artifact.upload containerfolder=qodana-report;artifactname=qodana-report;]{}",
                    archive.display()
                ),
                format!(
                    "##vso[artifact.upload containerfolder=CodeAnalysisLogs;artifactname=CodeAnalysisLogs;]{}",
                    sarif.display()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_reported_failed() {
        let results = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let present = results.path().join("a.json");
        std::fs::write(&present, b"1").unwrap();
        let missing = results.path().join("gone.json");

        let captured = Captured::default();
        let report = AzureArtifacts::new(captured.commands(), staging.path())
            .upload(
                "qodana-report",
                &[present.clone(), missing.clone()],
                results.path(),
                UploadOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(report.uploaded, vec![present]);
        assert_eq!(report.failed, vec![missing]);
        assert_eq!(captured.lines().len(), 1);
    }
}
