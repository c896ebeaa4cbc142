//! Action inputs.
//!
//! The runner exposes each input as `INPUT_<NAME>`, upper-cased with spaces
//! replaced by underscores. Hyphens are kept: `results-dir` is read from
//! `INPUT_RESULTS-DIR`.

use qodana_ci_core::env::EnvSnapshot;
use qodana_ci_core::inputs::{InputDefaults, InputProvider};
use std::path::Path;

/// Reads action inputs from the environment.
#[derive(Debug, Clone)]
pub struct GitHubInputs {
    env: EnvSnapshot,
}

impl GitHubInputs {
    /// Inputs backed by `env`.
    #[must_use]
    pub fn new(env: EnvSnapshot) -> Self {
        Self { env }
    }

    /// Variable name holding input `name`.
    #[must_use]
    pub fn variable_name(name: &str) -> String {
        format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
    }

    /// GitHub defaults: upload off, caches on, directories under `temp_dir`.
    #[must_use]
    pub fn defaults(temp_dir: &Path) -> InputDefaults {
        InputDefaults {
            upload_result: false,
            use_caches: true,
            ..InputDefaults::new(temp_dir)
        }
    }
}

impl InputProvider for GitHubInputs {
    fn get_string(&self, name: &str) -> Option<String> {
        self.env
            .non_empty(&Self::variable_name(name))
            .map(|v| v.trim().to_string())
    }
}
