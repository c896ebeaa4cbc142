//! Cache bridge.
//!
//! Maps the tool's cache directory onto the host cache service. Every path
//! through here is best-effort: errors become [`StepOutcome::Failed`] or
//! [`RestoreOutcome::Failed`] and a warning, never an `Err`.

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::inputs::Inputs;
use crate::outcome::{RestoreOutcome, StepOutcome};
use crate::{Error, Result};

/// Host cache service.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Whether the host offers a cache service at all.
    fn is_supported(&self) -> bool;

    /// Restore `paths` from the first key that matches, trying `primary_key`
    /// then `restore_keys` in order (prefix matches allowed).
    ///
    /// Returns the matched key, or `None` on a miss.
    async fn restore(
        &self,
        paths: &[PathBuf],
        primary_key: &str,
        restore_keys: &[String],
    ) -> Result<Option<String>>;

    /// Save `paths` under `key`.
    async fn save(&self, paths: &[PathBuf], key: &str) -> Result<()>;
}

/// Cache provider for hosts without a cache service.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedCache;

#[async_trait]
impl CacheProvider for UnsupportedCache {
    fn is_supported(&self) -> bool {
        false
    }

    async fn restore(
        &self,
        _paths: &[PathBuf],
        _primary_key: &str,
        _restore_keys: &[String],
    ) -> Result<Option<String>> {
        Err(Error::host("cache", "not supported on this host"))
    }

    async fn save(&self, _paths: &[PathBuf], _key: &str) -> Result<()> {
        Err(Error::host("cache", "not supported on this host"))
    }
}

/// Primary key plus ordered fallback prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheKey {
    /// Exact key used for save and tried first on restore.
    pub primary: String,
    /// Restore fallbacks, most specific first.
    pub fallbacks: Vec<String>,
}

impl CacheKey {
    /// Derive keys from the tool version, the current ref and a hash addition.
    ///
    /// `qodana-{version}-{ref}-{addition}`, falling back to
    /// `qodana-{version}-{ref}-` and `qodana-{version}-`.
    #[must_use]
    pub fn derive(version: &str, ref_name: &str, addition: &str) -> Self {
        let base = format!("qodana-{version}-");
        let branch = format!("{base}{ref_name}-");
        Self {
            primary: format!("{branch}{addition}"),
            fallbacks: vec![branch, base],
        }
    }

    /// Keys for a run: derived ones, replaced by user-supplied keys where given.
    ///
    /// The hash addition defaults to the commit SHA. A user-supplied
    /// additional key is tried before the derived fallbacks.
    #[must_use]
    pub fn for_run(inputs: &Inputs, context: &RunContext) -> Self {
        let derived = Self::derive(&inputs.cli_version, &context.ref_name, &context.sha);
        Self {
            primary: inputs
                .primary_cache_key
                .clone()
                .unwrap_or(derived.primary),
            fallbacks: inputs
                .additional_cache_key
                .clone()
                .into_iter()
                .chain(derived.fallbacks)
                .collect(),
        }
    }
}

/// When caches are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Caching enabled at all.
    pub enabled: bool,
    /// Only save from the default branch.
    pub default_branch_only: bool,
}

impl CachePolicy {
    /// Policy from inputs.
    ///
    /// Restricting saves to the default branch while caching is disabled
    /// has no effect; it is warned about and otherwise ignored.
    #[must_use]
    pub fn from_inputs(inputs: &Inputs) -> Self {
        if !inputs.use_caches && inputs.cache_default_branch_only {
            warn!(
                "cache-default-branch-only is set but use-caches is disabled; \
                 no caches will be used"
            );
        }
        Self {
            enabled: inputs.use_caches,
            default_branch_only: inputs.cache_default_branch_only,
        }
    }
}

/// Restores and saves the tool cache through a [`CacheProvider`].
pub struct CacheBridge<'a> {
    provider: &'a dyn CacheProvider,
    policy: CachePolicy,
    key: CacheKey,
    paths: Vec<PathBuf>,
}

impl<'a> CacheBridge<'a> {
    /// Create a bridge caching `paths` under `key`.
    #[must_use]
    pub fn new(
        provider: &'a dyn CacheProvider,
        policy: CachePolicy,
        key: CacheKey,
        paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            provider,
            policy,
            key,
            paths,
        }
    }

    fn skip_reason(&self) -> Option<&'static str> {
        if !self.policy.enabled {
            return Some("caching disabled");
        }
        if !self.provider.is_supported() {
            warn!("Caching is not supported on this host; skipping cache restore and save");
            return Some("caching not supported on this host");
        }
        None
    }

    /// Restore the cache, primary key first.
    pub async fn restore(&self) -> RestoreOutcome {
        if let Some(reason) = self.skip_reason() {
            return RestoreOutcome::Skipped(reason.to_string());
        }

        debug!(primary = %self.key.primary, fallbacks = ?self.key.fallbacks, "Restoring cache");
        match self
            .provider
            .restore(&self.paths, &self.key.primary, &self.key.fallbacks)
            .await
        {
            Ok(Some(key)) => {
                info!(%key, "Cache restored");
                RestoreOutcome::Hit(key)
            }
            Ok(None) => {
                info!(
                    primary = %self.key.primary,
                    "No cache found for any key"
                );
                RestoreOutcome::Miss
            }
            Err(e) => {
                warn!("Failed to restore cache: {e}");
                RestoreOutcome::Failed(e.to_string())
            }
        }
    }

    /// Save the cache under the primary key.
    ///
    /// Skipped when the restore already hit the primary key, when only the
    /// default branch may save and this is another ref, or when there is
    /// nothing on disk to save.
    pub async fn save(&self, context: &RunContext, restored: &RestoreOutcome) -> StepOutcome {
        if let Some(reason) = self.skip_reason() {
            return StepOutcome::skipped(reason);
        }
        if self.policy.default_branch_only && !context.is_default_branch() {
            info!(
                ref_name = %context.ref_name,
                "Cache upload is restricted to the default branch; skipping"
            );
            return StepOutcome::skipped("not the default branch");
        }
        if matches!(restored, RestoreOutcome::Hit(k) if *k == self.key.primary) {
            info!(key = %self.key.primary, "Cache hit occurred on the primary key; not saving");
            return StepOutcome::skipped("primary key already cached");
        }
        if !self.paths.iter().any(|p| p.exists()) {
            return StepOutcome::skipped("nothing to cache");
        }

        match self.provider.save(&self.paths, &self.key.primary).await {
            Ok(()) => {
                info!(key = %self.key.primary, "Cache saved");
                StepOutcome::Success
            }
            Err(e) => {
                warn!("Failed to save cache: {e}");
                StepOutcome::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_keys() {
        let key = CacheKey::derive("2024.3.4", "refs/heads/main", "abc");
        assert_eq!(key.primary, "qodana-2024.3.4-refs/heads/main-abc");
        assert_eq!(
            key.fallbacks,
            vec!["qodana-2024.3.4-refs/heads/main-", "qodana-2024.3.4-"]
        );
    }

    #[test]
    fn test_fallbacks_are_prefixes_of_primary() {
        let key = CacheKey::derive("1", "refs/heads/dev", "x");
        for fallback in &key.fallbacks {
            assert!(key.primary.starts_with(fallback.as_str()));
        }
    }

    #[test]
    fn test_user_keys_for_run() {
        let inputs = Inputs {
            args: Vec::new(),
            results_dir: PathBuf::from("/tmp/results"),
            cache_dir: PathBuf::from("/tmp/caches"),
            primary_cache_key: Some("custom".to_string()),
            additional_cache_key: Some("custom-".to_string()),
            use_caches: true,
            cache_default_branch_only: false,
            use_annotations: true,
            upload_result: false,
            pr_mode: true,
            artifact_name: "qodana-report".to_string(),
            cli_version: "2024.3.4".to_string(),
            checksum: None,
        };
        let mut context = RunContext::local(PathBuf::from("/tmp"));
        context.ref_name = "refs/heads/main".to_string();
        context.sha = "abc".to_string();

        let key = CacheKey::for_run(&inputs, &context);
        assert_eq!(key.primary, "custom");
        assert_eq!(
            key.fallbacks,
            vec![
                "custom-",
                "qodana-2024.3.4-refs/heads/main-",
                "qodana-2024.3.4-"
            ]
        );
    }

    #[tokio::test]
    async fn test_unsupported_cache_skips_both_steps() {
        let provider = UnsupportedCache;
        let bridge = CacheBridge::new(
            &provider,
            CachePolicy {
                enabled: true,
                default_branch_only: false,
            },
            CacheKey::derive("1", "main", "x"),
            vec![PathBuf::from("/nonexistent")],
        );
        let restored = bridge.restore().await;
        assert!(matches!(restored, RestoreOutcome::Skipped(_)));
        let context = RunContext::local(PathBuf::from("/tmp"));
        assert!(bridge.save(&context, &restored).await.is_skipped());
    }
}
