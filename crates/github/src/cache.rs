//! GitHub Actions cache service.
//!
//! Talks to the results service (`ACTIONS_RESULTS_URL`):
//!
//! - `GetCacheEntryDownloadURL` looks up the primary key, then the restore keys
//! - `CreateCacheEntry` reserves a key and hands out a signed upload URL
//! - the archive goes to blob storage in blocks
//! - `FinalizeCacheEntryUpload` commits the entry with its size
//!
//! Entries are gzip tarballs; each cached path is stored under its index
//! (`0`, `1`, ...) so restores put it back where it came from.

use async_trait::async_trait;
use qodana_ci_core::cache::CacheProvider;
use qodana_ci_core::env::EnvSnapshot;
use qodana_ci_core::{Error, Result, archive};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::blob;
use crate::results::{ResultsClient, is_ghes};

const SERVICE: &str = "CacheService";
const VERSION_SALT: &str = "1.0";

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    key: &'a str,
    restore_keys: &'a [String],
    version: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LookupResponse {
    ok: bool,
    signed_download_url: String,
    matched_key: String,
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    key: &'a str,
    version: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateResponse {
    ok: bool,
    signed_upload_url: String,
}

#[derive(Debug, Serialize)]
struct FinalizeRequest<'a> {
    key: &'a str,
    version: &'a str,
    size_bytes: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FinalizeResponse {
    ok: bool,
}

/// Cache provider backed by the Actions cache service.
pub struct GitHubCache {
    results: ResultsClient,
    server_url: Option<String>,
    temp_dir: PathBuf,
}

impl GitHubCache {
    /// Configure from `ACTIONS_RESULTS_URL`, `ACTIONS_RUNTIME_TOKEN` and
    /// `GITHUB_SERVER_URL`; archives are staged under `temp_dir`.
    #[must_use]
    pub fn from_env(env: &EnvSnapshot, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            results: ResultsClient::from_env(env),
            server_url: env.non_empty("GITHUB_SERVER_URL").map(String::from),
            temp_dir: temp_dir.into(),
        }
    }

    /// Entry version for `paths`; entries only match when saved for the
    /// same paths.
    #[must_use]
    pub fn version(paths: &[PathBuf]) -> String {
        let mut components: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        components.push(VERSION_SALT.to_string());
        hex::encode(Sha256::digest(components.join("|")))
    }

    fn staging_path(&self) -> PathBuf {
        self.temp_dir
            .join(format!("qodana-cache-{}.tgz", uuid::Uuid::new_v4()))
    }
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    match path.symlink_metadata() {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn copy_tree(source: &Path, dest: &Path) -> std::io::Result<()> {
    let meta = source.symlink_metadata()?;
    if meta.is_dir() {
        std::fs::create_dir_all(dest)?;
        for entry in std::fs::read_dir(source)? {
            let entry = entry?;
            copy_tree(&entry.path(), &dest.join(entry.file_name()))?;
        }
    } else if meta.file_type().is_symlink() {
        #[cfg(unix)]
        std::os::unix::fs::symlink(std::fs::read_link(source)?, dest)?;
        #[cfg(not(unix))]
        std::fs::copy(source, dest).map(|_| ())?;
    } else {
        std::fs::copy(source, dest)?;
    }
    Ok(())
}

/// Rename, or copy when `source` and `dest` are on different filesystems.
fn move_tree(source: &Path, dest: &Path) -> std::io::Result<()> {
    match std::fs::rename(source, dest) {
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            debug!(from = %source.display(), to = %dest.display(), "Copying across filesystems");
            let copied = copy_tree(source, dest);
            if copied.is_err() {
                let _ = remove_path(dest);
            }
            copied
        }
        other => other,
    }
}

/// Replace `target` with `source`.
///
/// The new content is first moved next to `target`, so the final swap is a
/// rename on one filesystem, and the old content is removed only after the
/// swap. On error `target` is left as it was.
fn replace_path(source: &Path, target: &Path) -> Result<()> {
    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let name = target
        .file_name()
        .map_or_else(|| "cache".to_string(), |n| n.to_string_lossy().into_owned());
    let id = uuid::Uuid::new_v4();
    let incoming = parent.join(format!(".{name}.restore-{id}"));
    let previous = parent.join(format!(".{name}.previous-{id}"));

    move_tree(source, &incoming)?;

    let had_previous = target.symlink_metadata().is_ok();
    if had_previous && let Err(e) = std::fs::rename(target, &previous) {
        let _ = remove_path(&incoming);
        return Err(e.into());
    }
    if let Err(e) = std::fs::rename(&incoming, target) {
        if had_previous {
            let _ = std::fs::rename(&previous, target);
        }
        let _ = remove_path(&incoming);
        return Err(e.into());
    }
    if had_previous && let Err(e) = remove_path(&previous) {
        warn!(path = %previous.display(), "Failed to remove replaced cache: {e}");
    }
    Ok(())
}

/// Put each restored `staging/<index>` in place of the matching path.
fn place_restored(staging: &Path, paths: &[PathBuf]) -> Result<()> {
    for (index, target) in paths.iter().enumerate() {
        let source = staging.join(index.to_string());
        if source.symlink_metadata().is_ok() {
            replace_path(&source, target)?;
        }
    }
    Ok(())
}

#[async_trait]
impl CacheProvider for GitHubCache {
    fn is_supported(&self) -> bool {
        !is_ghes(self.server_url.as_deref()) && self.results.is_configured()
    }

    async fn restore(
        &self,
        paths: &[PathBuf],
        primary_key: &str,
        restore_keys: &[String],
    ) -> Result<Option<String>> {
        let version = Self::version(paths);
        let lookup: Option<LookupResponse> = self
            .results
            .call(
                "cache",
                SERVICE,
                "GetCacheEntryDownloadURL",
                &LookupRequest {
                    key: primary_key,
                    restore_keys,
                    version: &version,
                },
            )
            .await?;
        let Some(entry) = lookup.filter(|e| e.ok && !e.signed_download_url.is_empty()) else {
            debug!(%primary_key, %version, "No cache entry");
            return Ok(None);
        };
        let key = if entry.matched_key.is_empty() {
            primary_key.to_string()
        } else {
            entry.matched_key
        };

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let archive_path = self.staging_path();
        let staging = archive_path.with_extension("d");

        let result: Result<()> = async {
            blob::download(
                self.results.http(),
                "cache",
                &entry.signed_download_url,
                &archive_path,
            )
            .await?;
            let (archive_path, staging, paths) =
                (archive_path.clone(), staging.clone(), paths.to_vec());
            tokio::task::spawn_blocking(move || {
                archive::extract_tar_gz(&archive_path, &staging)?;
                place_restored(&staging, &paths)
            })
            .await
            .map_err(|e| Error::host("cache", e.to_string()))?
        }
        .await;

        let _ = tokio::fs::remove_file(&archive_path).await;
        let _ = tokio::fs::remove_dir_all(&staging).await;
        result?;

        info!(%key, "Restored cache entry");
        Ok(Some(key))
    }

    async fn save(&self, paths: &[PathBuf], key: &str) -> Result<()> {
        let version = Self::version(paths);
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let archive_path = self.staging_path();

        let result: Result<()> = async {
            let entries: Vec<(String, PathBuf)> = paths
                .iter()
                .enumerate()
                .map(|(i, p)| (i.to_string(), p.clone()))
                .collect();
            let dest = archive_path.clone();
            tokio::task::spawn_blocking(move || archive::create_tar_gz(&dest, &entries))
                .await
                .map_err(|e| Error::host("cache", e.to_string()))??;

            let created: Option<CreateResponse> = self
                .results
                .call(
                    "cache",
                    SERVICE,
                    "CreateCacheEntry",
                    &CreateRequest {
                        key,
                        version: &version,
                    },
                )
                .await?;
            let created = created
                .filter(|c| c.ok && !c.signed_upload_url.is_empty())
                .ok_or_else(|| {
                    Error::host(
                        "cache",
                        format!("Unable to reserve cache with key {key}, another job may be creating this cache"),
                    )
                })?;

            let size = blob::upload(
                self.results.http(),
                "cache",
                &created.signed_upload_url,
                &archive_path,
            )
            .await?;
            debug!(%key, size, "Uploaded cache archive");

            let finalized: Option<FinalizeResponse> = self
                .results
                .call(
                    "cache",
                    SERVICE,
                    "FinalizeCacheEntryUpload",
                    &FinalizeRequest {
                        key,
                        version: &version,
                        size_bytes: size.to_string(),
                    },
                )
                .await?;
            if !finalized.is_some_and(|f| f.ok) {
                return Err(Error::host(
                    "cache",
                    format!("Cache entry {key} was not finalized"),
                ));
            }
            Ok(())
        }
        .await;

        let _ = tokio::fs::remove_file(&archive_path).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> EnvSnapshot {
        vars.iter().copied().collect()
    }

    #[test]
    fn test_version_depends_on_paths() {
        let a = GitHubCache::version(&[PathBuf::from("/tmp/qodana/caches")]);
        let b = GitHubCache::version(&[PathBuf::from("/tmp/other")]);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(a, GitHubCache::version(&[PathBuf::from("/tmp/qodana/caches")]));
    }

    #[test]
    fn test_supported_only_on_github_com_with_results_service() {
        let with_service = env(&[
            ("ACTIONS_RESULTS_URL", "https://results.example/"),
            ("GITHUB_SERVER_URL", "https://github.com"),
        ]);
        assert!(GitHubCache::from_env(&with_service, "/tmp").is_supported());

        let ghes = env(&[
            ("ACTIONS_RESULTS_URL", "https://results.example/"),
            ("GITHUB_SERVER_URL", "https://github.acme.corp"),
        ]);
        assert!(!GitHubCache::from_env(&ghes, "/tmp").is_supported());

        let no_service = env(&[
            ("ACTIONS_CACHE_URL", "https://artifactcache.example/"),
            ("GITHUB_SERVER_URL", "https://github.com"),
        ]);
        assert!(!GitHubCache::from_env(&no_service, "/tmp").is_supported());
    }

    #[test]
    fn test_place_restored_replaces_targets() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        std::fs::create_dir_all(staging.join("0")).unwrap();
        std::fs::write(staging.join("0").join("index"), b"new").unwrap();

        let target = dir.path().join("caches");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("stale"), b"old").unwrap();

        place_restored(&staging, &[target.clone(), dir.path().join("absent")]).unwrap();
        assert_eq!(std::fs::read(target.join("index")).unwrap(), b"new");
        assert!(!target.join("stale").exists());
        assert!(!dir.path().join("absent").exists());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with('.'))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn test_missing_source_keeps_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("caches");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("index"), b"kept").unwrap();

        assert!(replace_path(&dir.path().join("nothing"), &target).is_err());
        assert_eq!(std::fs::read(target.join("index")).unwrap(), b"kept");
    }

    #[test]
    fn test_copy_tree_copies_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        std::fs::create_dir_all(source.join("a").join("b")).unwrap();
        std::fs::write(source.join("a").join("b").join("file"), b"deep").unwrap();
        std::fs::write(source.join("top"), b"top").unwrap();

        let dest = dir.path().join("dest");
        copy_tree(&source, &dest).unwrap();
        assert_eq!(std::fs::read(dest.join("a").join("b").join("file")).unwrap(), b"deep");
        assert_eq!(std::fs::read(dest.join("top")).unwrap(), b"top");
    }

    /// Staging under the temp dir, target on tmpfs.
    #[cfg(target_os = "linux")]
    #[test]
    fn test_place_restored_across_filesystems() {
        use std::os::unix::fs::MetadataExt;

        let shm = Path::new("/dev/shm");
        if !shm.is_dir() {
            return;
        }
        let staging_root = tempfile::tempdir().unwrap();
        let Ok(target_root) = tempfile::tempdir_in(shm) else {
            return;
        };
        let dev = |p: &Path| std::fs::metadata(p).unwrap().dev();
        if dev(staging_root.path()) == dev(target_root.path()) {
            return;
        }

        let staging = staging_root.path().join("staging");
        std::fs::create_dir_all(staging.join("0").join("idea")).unwrap();
        std::fs::write(staging.join("0").join("idea").join("index"), b"restored").unwrap();

        let target = target_root.path().join("caches");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("existing"), b"old").unwrap();

        place_restored(&staging, std::slice::from_ref(&target)).unwrap();
        assert_eq!(
            std::fs::read(target.join("idea").join("index")).unwrap(),
            b"restored"
        );
        assert!(!target.join("existing").exists());
    }
}
