//! Artifact bridge.
//!
//! Uploads the files directly under the results directory as one named
//! artifact. Failures are downgraded to warnings.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::Result;
use crate::outcome::StepOutcome;

/// Options for an artifact upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// Keep uploading remaining files after one fails.
    pub continue_on_error: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            continue_on_error: true,
        }
    }
}

/// What an upload achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Files that were uploaded.
    pub uploaded: Vec<PathBuf>,
    /// Files that could not be uploaded.
    pub failed: Vec<PathBuf>,
}

/// Host artifact service.
#[async_trait]
pub trait ArtifactProvider: Send + Sync {
    /// Upload `files` (all under `base_dir`) as the artifact `name`.
    async fn upload(
        &self,
        name: &str,
        files: &[PathBuf],
        base_dir: &Path,
        options: UploadOptions,
    ) -> Result<UploadReport>;
}

/// Regular files directly under `dir`, sorted by path.
pub fn list_results(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Uploads a results directory through an [`ArtifactProvider`].
pub struct ArtifactBridge<'a> {
    provider: &'a dyn ArtifactProvider,
    enabled: bool,
    name: String,
}

impl<'a> ArtifactBridge<'a> {
    /// Create a bridge uploading as `name` when `enabled`.
    #[must_use]
    pub fn new(provider: &'a dyn ArtifactProvider, enabled: bool, name: impl Into<String>) -> Self {
        Self {
            provider,
            enabled,
            name: name.into(),
        }
    }

    /// Upload the files of `results_dir`.
    ///
    /// Returns immediately, without touching the provider, when disabled.
    pub async fn upload_results(&self, results_dir: &Path) -> StepOutcome {
        if !self.enabled {
            return StepOutcome::skipped("upload disabled");
        }

        let files = match list_results(results_dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %results_dir.display(), "Failed to list results: {e}");
                return StepOutcome::failed(e.to_string());
            }
        };
        if files.is_empty() {
            warn!(dir = %results_dir.display(), "No result files to upload");
            return StepOutcome::skipped("no result files");
        }

        info!(name = %self.name, count = files.len(), "Uploading results artifact");
        match self
            .provider
            .upload(&self.name, &files, results_dir, UploadOptions::default())
            .await
        {
            Ok(report) if report.failed.is_empty() => StepOutcome::Success,
            Ok(report) => {
                warn!(
                    failed = report.failed.len(),
                    uploaded = report.uploaded.len(),
                    "Some result files failed to upload"
                );
                StepOutcome::failed(format!(
                    "{} of {} files failed to upload",
                    report.failed.len(),
                    files.len()
                ))
            }
            Err(e) => {
                warn!("Failed to upload results artifact: {e}");
                StepOutcome::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_results_is_shallow_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.sarif.json"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("log")).unwrap();
        std::fs::write(dir.path().join("log").join("idea.log"), "").unwrap();

        let files = list_results(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a.sarif.json"), dir.path().join("b.json")]
        );
    }

    #[test]
    fn test_list_results_missing_dir() {
        assert!(list_results(Path::new("/definitely/missing/results")).is_err());
    }
}
