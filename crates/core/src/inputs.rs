//! Action/task inputs.
//!
//! Inputs are resolved once per run through an [`InputProvider`] and are
//! read-only afterwards. Names are canonical kebab-case (`results-dir`);
//! each host provider maps them onto its own environment convention.

use std::path::PathBuf;

use crate::{Error, Result};

/// Qodana CLI release used when no version input is given.
pub const DEFAULT_CLI_VERSION: &str = "2024.3.4";

/// Artifact name used when no name input is given.
pub const DEFAULT_ARTIFACT_NAME: &str = "qodana-report";

/// Canonical input names.
#[allow(missing_docs)]
pub mod names {
    pub const ARGS: &str = "args";
    pub const RESULTS_DIR: &str = "results-dir";
    pub const CACHE_DIR: &str = "cache-dir";
    pub const USE_CACHES: &str = "use-caches";
    pub const PRIMARY_CACHE_KEY: &str = "primary-cache-key";
    pub const ADDITIONAL_CACHE_KEY: &str = "additional-cache-key";
    pub const CACHE_DEFAULT_BRANCH_ONLY: &str = "cache-default-branch-only";
    pub const USE_ANNOTATIONS: &str = "use-annotations";
    pub const UPLOAD_RESULT: &str = "upload-result";
    pub const ARTIFACT_NAME: &str = "artifact-name";
    pub const PR_MODE: &str = "pr-mode";
    pub const CLI_VERSION: &str = "cli-version";
    pub const CHECKSUM: &str = "checksum";
}

/// Read-only access to named host inputs.
pub trait InputProvider: Send + Sync {
    /// Raw value of an input, `None` when unset or blank.
    fn get_string(&self, name: &str) -> Option<String>;

    /// Boolean input.
    ///
    /// Accepts `true`, `True`, `TRUE`, `false`, `False`, `FALSE`; anything
    /// else is a configuration error. Unset inputs yield `None`.
    fn get_bool(&self, name: &str) -> Result<Option<bool>> {
        let Some(value) = self.get_string(name) else {
            return Ok(None);
        };
        match value.as_str() {
            "true" | "True" | "TRUE" => Ok(Some(true)),
            "false" | "False" | "FALSE" => Ok(Some(false)),
            other => Err(Error::configuration_with_help(
                format!("Input '{name}' is not a boolean: {other}"),
                "Use one of: true, True, TRUE, false, False, FALSE",
            )),
        }
    }

    /// List input split on commas and newlines, trimmed, blanks dropped.
    fn get_list(&self, name: &str) -> Vec<String> {
        self.get_string(name)
            .map(|value| split_list(&value))
            .unwrap_or_default()
    }
}

/// Split a comma/newline separated value.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Host-specific defaults for inputs that were not provided.
#[derive(Debug, Clone)]
pub struct InputDefaults {
    /// Runner temp directory; results and caches default to subdirectories.
    pub temp_dir: PathBuf,
    /// Whether results are uploaded when `upload-result` is unset.
    pub upload_result: bool,
    /// Whether caches are used when `use-caches` is unset.
    pub use_caches: bool,
}

impl InputDefaults {
    /// Defaults rooted at `temp_dir`.
    #[must_use]
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            upload_result: false,
            use_caches: true,
        }
    }

    /// Default results directory.
    #[must_use]
    pub fn results_dir(&self) -> PathBuf {
        self.temp_dir.join("qodana").join("results")
    }

    /// Default cache directory.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.temp_dir.join("qodana").join("caches")
    }
}

/// Resolved inputs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inputs {
    /// Extra arguments passed to `qodana scan`.
    pub args: Vec<String>,
    /// Directory the tool writes reports into.
    pub results_dir: PathBuf,
    /// Directory the tool keeps its caches in.
    pub cache_dir: PathBuf,
    /// Explicit primary cache key.
    pub primary_cache_key: Option<String>,
    /// Explicit additional (fallback) cache key.
    pub additional_cache_key: Option<String>,
    /// Restore and save the tool cache.
    pub use_caches: bool,
    /// Only save the cache from the default branch.
    pub cache_default_branch_only: bool,
    /// Publish a job summary.
    pub use_annotations: bool,
    /// Upload the results directory as an artifact.
    pub upload_result: bool,
    /// Scope pull request scans to the changes since the base commit.
    pub pr_mode: bool,
    /// Name of the results artifact.
    pub artifact_name: String,
    /// Qodana CLI release to install.
    pub cli_version: String,
    /// Expected SHA-256 of the package for the host platform.
    pub checksum: Option<String>,
}

impl Inputs {
    /// Resolve all inputs from a provider.
    ///
    /// # Errors
    ///
    /// Fails if a boolean input holds a non-boolean value.
    pub fn resolve(provider: &dyn InputProvider, defaults: &InputDefaults) -> Result<Self> {
        let path_or = |name: &str, default: PathBuf| {
            provider
                .get_string(name)
                .map_or(default, PathBuf::from)
        };

        Ok(Self {
            args: provider.get_list(names::ARGS),
            results_dir: path_or(names::RESULTS_DIR, defaults.results_dir()),
            cache_dir: path_or(names::CACHE_DIR, defaults.cache_dir()),
            primary_cache_key: provider.get_string(names::PRIMARY_CACHE_KEY),
            additional_cache_key: provider.get_string(names::ADDITIONAL_CACHE_KEY),
            use_caches: provider
                .get_bool(names::USE_CACHES)?
                .unwrap_or(defaults.use_caches),
            cache_default_branch_only: provider
                .get_bool(names::CACHE_DEFAULT_BRANCH_ONLY)?
                .unwrap_or(false),
            use_annotations: provider.get_bool(names::USE_ANNOTATIONS)?.unwrap_or(true),
            upload_result: provider
                .get_bool(names::UPLOAD_RESULT)?
                .unwrap_or(defaults.upload_result),
            pr_mode: provider.get_bool(names::PR_MODE)?.unwrap_or(true),
            artifact_name: provider
                .get_string(names::ARTIFACT_NAME)
                .unwrap_or_else(|| DEFAULT_ARTIFACT_NAME.to_string()),
            cli_version: provider
                .get_string(names::CLI_VERSION)
                .unwrap_or_else(|| DEFAULT_CLI_VERSION.to_string()),
            checksum: provider.get_string(names::CHECKSUM),
        })
    }
}
