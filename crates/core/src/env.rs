//! Process environment captured once at startup.
//!
//! Input providers and run-context detection read from an [`EnvSnapshot`]
//! instead of `std::env`, so they can be exercised with plain maps.

use std::collections::BTreeMap;

/// An immutable copy of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    #[must_use]
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    /// Look up a variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Look up a variable, treating empty values as unset.
    #[must_use]
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.trim().is_empty())
    }

    /// Whether the variable is set to exactly `expected`, ignoring ASCII case.
    #[must_use]
    pub fn is(&self, name: &str, expected: &str) -> bool {
        self.get(name)
            .is_some_and(|v| v.eq_ignore_ascii_case(expected))
    }
}

impl<K, V> FromIterator<(K, V)> for EnvSnapshot
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_filters_blank() {
        let env: EnvSnapshot = [("A", "  "), ("B", "x")].into_iter().collect();
        assert_eq!(env.non_empty("A"), None);
        assert_eq!(env.non_empty("B"), Some("x"));
        assert_eq!(env.get("A"), Some("  "));
    }

    #[test]
    fn test_is_case_insensitive() {
        let env: EnvSnapshot = [("GITHUB_ACTIONS", "True")].into_iter().collect();
        assert!(env.is("GITHUB_ACTIONS", "true"));
        assert!(!env.is("TF_BUILD", "true"));
    }
}
