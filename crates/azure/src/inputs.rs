//! Task inputs.
//!
//! Azure task inputs are camelCase (`resultsDir`, `uploadResult`). The agent
//! exposes them as `INPUT_<NAME>`, upper-cased with `.` and spaces replaced
//! by `_`. Callers keep using the kebab-case input names shared with the
//! GitHub action; they are converted here.

use qodana_ci_core::env::EnvSnapshot;
use qodana_ci_core::inputs::{InputDefaults, InputProvider};
use std::path::Path;

/// Reads task inputs from the environment.
#[derive(Debug, Clone)]
pub struct AzureInputs {
    env: EnvSnapshot,
}

/// `results-dir` → `resultsDir`.
#[must_use]
pub fn task_input_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '-' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

impl AzureInputs {
    /// Inputs backed by `env`.
    #[must_use]
    pub fn new(env: EnvSnapshot) -> Self {
        Self { env }
    }

    /// Variable name holding input `name`.
    #[must_use]
    pub fn variable_name(name: &str) -> String {
        format!(
            "INPUT_{}",
            task_input_name(name)
                .replace(['.', ' '], "_")
                .to_uppercase()
        )
    }

    /// Azure defaults: upload on, caches off, directories under `temp_dir`.
    #[must_use]
    pub fn defaults(temp_dir: &Path) -> InputDefaults {
        InputDefaults {
            upload_result: true,
            use_caches: false,
            ..InputDefaults::new(temp_dir)
        }
    }
}

impl InputProvider for AzureInputs {
    fn get_string(&self, name: &str) -> Option<String> {
        self.env
            .non_empty(&Self::variable_name(name))
            .map(|v| v.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qodana_ci_core::inputs::{Inputs, names};

    #[test]
    fn test_variable_names() {
        assert_eq!(task_input_name("results-dir"), "resultsDir");
        assert_eq!(task_input_name("args"), "args");
        assert_eq!(AzureInputs::variable_name(names::RESULTS_DIR), "INPUT_RESULTSDIR");
        assert_eq!(
            AzureInputs::variable_name(names::CACHE_DEFAULT_BRANCH_ONLY),
            "INPUT_CACHEDEFAULTBRANCHONLY"
        );
        assert_eq!(AzureInputs::variable_name("qodana.args"), "INPUT_QODANA_ARGS");
    }

    #[test]
    fn test_resolve_with_azure_defaults() {
        let env: EnvSnapshot = [
            ("INPUT_ARGS", "--linter\njetbrains/qodana-dotnet"),
            ("INPUT_RESULTSDIR", "/agent/_temp/res"),
        ]
        .into_iter()
        .collect();
        let resolved = Inputs::resolve(
            &AzureInputs::new(env),
            &AzureInputs::defaults(Path::new("/agent/_temp")),
        )
        .unwrap();

        assert_eq!(resolved.args, vec!["--linter", "jetbrains/qodana-dotnet"]);
        assert_eq!(resolved.results_dir, Path::new("/agent/_temp/res"));
        assert!(resolved.upload_result);
        assert!(!resolved.use_caches);
    }
}
