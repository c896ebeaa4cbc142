//! SHA-256 verification of downloaded tool packages.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::platform::Platform;
use crate::{Error, Result};

/// Expected package hashes keyed by host platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumTable {
    entries: HashMap<Platform, String>,
}

impl ChecksumTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the expected hash for a platform, replacing any previous one.
    pub fn insert(&mut self, platform: Platform, sha256: impl Into<String>) {
        self.entries
            .insert(platform, sha256.into().trim().to_ascii_lowercase());
    }

    /// The expected hash for a platform.
    #[must_use]
    pub fn expected(&self, platform: &Platform) -> Option<&str> {
        self.entries.get(platform).map(String::as_str)
    }

    /// Number of registered platforms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no platform is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a release `checksums.txt` manifest.
    ///
    /// Each line is `<sha256>  <file name>`; a leading `*` on the file name
    /// (binary mode marker) is ignored. Files that are not a package of
    /// `tool` for a known platform are skipped.
    #[must_use]
    pub fn parse_manifest(tool: &str, manifest: &str) -> Self {
        let by_name: HashMap<String, Platform> = Platform::all()
            .into_iter()
            .map(|p| (p.package_name(tool), p))
            .collect();

        let mut table = Self::new();
        for line in manifest.lines() {
            let mut parts = line.split_whitespace();
            let (Some(hash), Some(name)) = (parts.next(), parts.next()) else {
                continue;
            };
            let name = name.trim_start_matches('*');
            if !is_sha256_hex(hash) {
                warn!(%line, "Ignoring malformed checksum line");
                continue;
            }
            if let Some(platform) = by_name.get(name) {
                table.insert(*platform, hash);
            }
        }
        debug!(entries = table.len(), "Parsed checksum manifest");
        table
    }

    /// Verify that `path` hashes to the value registered for `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChecksumUnknown`] if nothing is registered for the
    /// platform and [`Error::ChecksumMismatch`] if the hashes differ.
    pub async fn verify(&self, path: &Path, platform: &Platform) -> Result<()> {
        let expected = self
            .expected(platform)
            .ok_or_else(|| Error::ChecksumUnknown {
                platform: platform.to_string(),
            })?;
        let actual = compute_file_sha256(path).await?;
        if actual != expected {
            return Err(Error::checksum_mismatch(
                platform.to_string(),
                expected,
                actual,
            ));
        }
        debug!(path = %path.display(), %platform, sha256 = %actual, "Checksum verified");
        Ok(())
    }
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Compute the lowercase hex SHA-256 of a file.
pub async fn compute_file_sha256(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
