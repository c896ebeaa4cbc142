//! Workflow artifacts.
//!
//! `ArtifactService/CreateArtifact` hands out a signed blob URL, the result
//! files are zipped and uploaded there, and `FinalizeArtifact` records the
//! size and SHA-256 of the zip. The run and job the artifact belongs to come
//! from the runtime token.

use async_trait::async_trait;
use qodana_ci_core::artifact::{ArtifactProvider, UploadOptions, UploadReport};
use qodana_ci_core::checksum::compute_file_sha256;
use qodana_ci_core::env::EnvSnapshot;
use qodana_ci_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::blob;
use crate::results::{BackendIds, ResultsClient, backend_ids};

const SERVICE: &str = "ArtifactService";
const ARTIFACT_VERSION: u32 = 4;

#[derive(Debug, Serialize)]
struct CreateArtifactRequest<'a> {
    #[serde(flatten)]
    ids: &'a BackendIds,
    name: &'a str,
    version: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateArtifactResponse {
    ok: bool,
    signed_upload_url: String,
}

#[derive(Debug, Serialize)]
struct FinalizeArtifactRequest<'a> {
    #[serde(flatten)]
    ids: &'a BackendIds,
    name: &'a str,
    size: String,
    hash: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FinalizeArtifactResponse {
    ok: bool,
    artifact_id: serde_json::Value,
}

/// Artifact provider backed by the Actions results service.
pub struct GitHubArtifacts {
    results: ResultsClient,
    temp_dir: PathBuf,
}

impl GitHubArtifacts {
    /// Configure from `ACTIONS_RESULTS_URL` and `ACTIONS_RUNTIME_TOKEN`;
    /// zips are staged under `temp_dir`.
    #[must_use]
    pub fn from_env(env: &EnvSnapshot, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            results: ResultsClient::from_env(env),
            temp_dir: temp_dir.into(),
        }
    }

    async fn publish(&self, ids: &BackendIds, name: &str, zip_path: &Path) -> Result<()> {
        let created: Option<CreateArtifactResponse> = self
            .results
            .call(
                "artifact",
                SERVICE,
                "CreateArtifact",
                &CreateArtifactRequest {
                    ids,
                    name,
                    version: ARTIFACT_VERSION,
                },
            )
            .await?;
        let created = created
            .filter(|c| c.ok && !c.signed_upload_url.is_empty())
            .ok_or_else(|| Error::host("artifact", format!("Unable to create artifact {name}")))?;

        let size = blob::upload(
            self.results.http(),
            "artifact",
            &created.signed_upload_url,
            zip_path,
        )
        .await?;
        let hash = compute_file_sha256(zip_path).await?;
        debug!(artifact = name, size, %hash, "Uploaded artifact zip");

        let finalized: Option<FinalizeArtifactResponse> = self
            .results
            .call(
                "artifact",
                SERVICE,
                "FinalizeArtifact",
                &FinalizeArtifactRequest {
                    ids,
                    name,
                    size: size.to_string(),
                    hash: format!("sha256:{hash}"),
                },
            )
            .await?;
        let finalized = finalized
            .filter(|f| f.ok)
            .ok_or_else(|| Error::host("artifact", format!("Unable to finalize artifact {name}")))?;

        info!(artifact = name, artifact_id = %finalized.artifact_id, bytes = size, "Artifact uploaded");
        Ok(())
    }
}

/// Path of `file` inside the zip: relative to `base_dir`, forward slashes.
fn entry_name(file: &Path, base_dir: &Path) -> String {
    let relative = file.strip_prefix(base_dir).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Zip `files` into `dest`. Unreadable files are skipped when
/// `continue_on_error` is set and reported as failed.
fn write_zip(
    dest: &Path,
    files: &[PathBuf],
    base_dir: &Path,
    options: UploadOptions,
) -> Result<UploadReport> {
    let zip_error = |e: zip::result::ZipError| Error::host("artifact", e.to_string());
    let mut zip = ZipWriter::new(File::create(dest)?);
    let mut report = UploadReport::default();

    for file in files {
        match std::fs::read(file) {
            Ok(data) => {
                zip.start_file(entry_name(file, base_dir), SimpleFileOptions::default())
                    .map_err(zip_error)?;
                zip.write_all(&data)?;
                report.uploaded.push(file.clone());
            }
            Err(e) if options.continue_on_error => {
                warn!(file = %file.display(), "Failed to add artifact file: {e}");
                report.failed.push(file.clone());
            }
            Err(e) => return Err(e.into()),
        }
    }

    zip.finish().map_err(zip_error)?;
    Ok(report)
}

#[async_trait]
impl ArtifactProvider for GitHubArtifacts {
    async fn upload(
        &self,
        name: &str,
        files: &[PathBuf],
        base_dir: &Path,
        options: UploadOptions,
    ) -> Result<UploadReport> {
        let token = self
            .results
            .token()
            .ok_or_else(|| Error::host("artifact", "ACTIONS_RUNTIME_TOKEN is not set"))?;
        let ids = backend_ids(token)?;

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let zip_path = self
            .temp_dir
            .join(format!("qodana-artifact-{}.zip", uuid::Uuid::new_v4()));

        let (dest, owned, base) = (zip_path.clone(), files.to_vec(), base_dir.to_path_buf());
        let report = tokio::task::spawn_blocking(move || write_zip(&dest, &owned, &base, options))
            .await
            .map_err(|e| Error::host("artifact", e.to_string()));

        let result = match report {
            Ok(Ok(report)) if report.uploaded.is_empty() => {
                warn!(artifact = name, "No readable files; artifact not created");
                Ok(report)
            }
            Ok(Ok(report)) => self.publish(&ids, name, &zip_path).await.map(|()| report),
            Ok(Err(e)) | Err(e) => Err(e),
        };

        let _ = tokio::fs::remove_file(&zip_path).await;
        result
    }
}
