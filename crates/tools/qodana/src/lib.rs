//! Qodana CLI installer.
//!
//! Fetches `qodana_<os>_<arch>.<ext>` for a pinned version from the
//! qodana-cli GitHub Releases, verifies its SHA-256 and unpacks it into a
//! versioned tool cache directory:
//!
//! ```text
//! <tool cache>/qodana/<version>/<os>_<arch>/qodana[.exe]
//! ```
//!
//! The expected hash comes from an explicit checksum when one is configured,
//! otherwise from the release's `checksums.txt`. A package with no known
//! hash is never installed.

use async_trait::async_trait;
use qodana_ci_core::checksum::ChecksumTable;
use qodana_ci_core::host::ToolInstaller;
use qodana_ci_core::platform::Platform;
use qodana_ci_core::{Error, Result, TOOL_NAME, archive};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Where qodana-cli releases are published.
pub const DEFAULT_RELEASES_URL: &str = "https://github.com/JetBrains/qodana-cli/releases/download";

/// Name of the checksum manifest attached to every release.
pub const CHECKSUMS_FILE: &str = "checksums.txt";

/// Installs a pinned Qodana CLI version.
pub struct QodanaInstaller {
    client: Client,
    releases_url: String,
    version: String,
    tool_cache_dir: PathBuf,
    checksum: Option<String>,
}

impl QodanaInstaller {
    /// Create an installer for `version`, caching under `tool_cache_dir`.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be initialised.
    pub fn new(version: impl Into<String>, tool_cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("qodana-ci/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::download(DEFAULT_RELEASES_URL, e.to_string()))?;

        Ok(Self {
            client,
            releases_url: DEFAULT_RELEASES_URL.to_string(),
            version: normalize_version(&version.into()),
            tool_cache_dir: tool_cache_dir.into(),
            checksum: None,
        })
    }

    /// Download from a different releases mirror.
    #[must_use]
    pub fn with_releases_url(mut self, url: impl Into<String>) -> Self {
        self.releases_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use `checksum` instead of the release manifest.
    #[must_use]
    pub fn with_checksum(mut self, checksum: Option<String>) -> Self {
        self.checksum = checksum.filter(|c| !c.trim().is_empty());
        self
    }

    /// The version this installer pins, without a leading `v`.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    fn release_url(&self, file: &str) -> String {
        format!("{}/v{}/{}", self.releases_url, self.version, file)
    }

    /// URL of the package for `platform`.
    #[must_use]
    pub fn download_url(&self, platform: &Platform) -> String {
        self.release_url(&platform.package_name(TOOL_NAME))
    }

    /// Directory the package for `platform` is unpacked into.
    #[must_use]
    pub fn install_dir(&self, platform: &Platform) -> PathBuf {
        self.tool_cache_dir
            .join(TOOL_NAME)
            .join(&self.version)
            .join(platform.to_string())
    }

    async fn checksums(&self, platform: &Platform) -> Result<ChecksumTable> {
        if let Some(checksum) = &self.checksum {
            debug!(%platform, "Using configured checksum");
            let mut table = ChecksumTable::new();
            table.insert(*platform, checksum.trim());
            return Ok(table);
        }

        let url = self.release_url(CHECKSUMS_FILE);
        debug!(%url, "Fetching checksum manifest");
        let manifest = self.get(&url).await?.text().await.map_err(|e| {
            Error::download(&url, format!("Failed to read checksum manifest: {e}"))
        })?;
        Ok(ChecksumTable::parse_manifest(TOOL_NAME, &manifest))
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::download(url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::download(url, format!("HTTP {}", response.status())));
        }
        Ok(response)
    }

    /// Stream `url` into `dest`.
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        info!(%url, "Downloading Qodana CLI");
        let mut response = self.get(url).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::download(url, e.to_string()))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    async fn fetch_and_unpack(&self, platform: &Platform, dest: &Path) -> Result<()> {
        let checksums = self.checksums(platform).await?;
        // Fail before downloading anything when the hash is unknown.
        if checksums.expected(platform).is_none() {
            return Err(Error::ChecksumUnknown {
                platform: platform.to_string(),
            });
        }

        let package = dest.with_file_name(format!(".{}", platform.package_name(TOOL_NAME)));
        self.download(&self.download_url(platform), &package).await?;

        let result: Result<()> = async {
            checksums.verify(&package, platform).await?;
            let archive_path = package.clone();
            let dest = dest.to_path_buf();
            let format = platform.archive_format();
            tokio::task::spawn_blocking(move || archive::extract(&archive_path, format, &dest))
                .await
                .map_err(|e| Error::extraction(&package, e.to_string()))?
        }
        .await;

        let _ = tokio::fs::remove_file(&package).await;
        result
    }
}

#[async_trait]
impl ToolInstaller for QodanaInstaller {
    async fn install(&self, platform: &Platform) -> Result<PathBuf> {
        let dir = self.install_dir(platform);
        let executable = dir.join(platform.executable_name(TOOL_NAME));

        if executable.is_file() {
            info!(path = %executable.display(), "Qodana CLI already installed");
            return Ok(executable);
        }

        self.fetch_and_unpack(platform, &dir).await?;

        if !executable.is_file() {
            return Err(Error::extraction(
                &dir,
                format!("package does not contain {}", platform.executable_name(TOOL_NAME)),
            ));
        }
        make_executable(&executable)?;

        info!(version = %self.version, path = %executable.display(), "Installed Qodana CLI");
        Ok(executable)
    }
}

fn normalize_version(version: &str) -> String {
    version.trim().trim_start_matches('v').to_string()
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qodana_ci_core::platform::{Arch, Os};

    fn installer() -> QodanaInstaller {
        QodanaInstaller::new("v2024.3.4", "/opt/hostedtoolcache").unwrap()
    }

    #[test]
    fn test_download_url() {
        let url = installer().download_url(&Platform::new(Os::Linux, Arch::X86_64));
        assert_eq!(
            url,
            "https://github.com/JetBrains/qodana-cli/releases/download/v2024.3.4/qodana_linux_x86_64.tar.gz"
        );

        let url = installer().download_url(&Platform::new(Os::Windows, Arch::Arm64));
        assert!(url.ends_with("/v2024.3.4/qodana_windows_arm64.zip"));
    }

    #[test]
    fn test_mirror_url_trailing_slash() {
        let installer = installer().with_releases_url("http://localhost:9000/dl/");
        assert_eq!(
            installer.release_url(CHECKSUMS_FILE),
            "http://localhost:9000/dl/v2024.3.4/checksums.txt"
        );
    }

    #[test]
    fn test_install_dir_is_versioned_per_platform() {
        let dir = installer().install_dir(&Platform::new(Os::Darwin, Arch::Arm64));
        assert_eq!(
            dir,
            PathBuf::from("/opt/hostedtoolcache/qodana/2024.3.4/darwin_arm64")
        );
    }

    #[test]
    fn test_blank_checksum_is_ignored() {
        let installer = installer().with_checksum(Some("  ".into()));
        assert!(installer.checksum.is_none());
    }

    #[tokio::test]
    async fn test_configured_checksum_skips_manifest() {
        let platform = Platform::new(Os::Linux, Arch::Arm64);
        let installer = installer()
            .with_releases_url("http://127.0.0.1:9")
            .with_checksum(Some("ABCDEF".into()));
        let table = installer.checksums(&platform).await.unwrap();
        assert_eq!(table.expected(&platform), Some("abcdef"));
    }
}
