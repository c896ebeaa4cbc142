//! Outcomes of best-effort steps.
//!
//! Cache and artifact steps never fail a run. They report what happened
//! through these values so callers (and tests) can inspect it directly.

use serde::Serialize;
use std::fmt;

/// Result of a best-effort step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum StepOutcome {
    /// The step ran and succeeded.
    Success,
    /// The step did not run.
    Skipped(String),
    /// The step ran and failed; the run continues.
    Failed(String),
}

impl StepOutcome {
    /// Skipped with a reason.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }

    /// Failed with a reason.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Whether the step succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether the step was skipped.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Result of a cache restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum RestoreOutcome {
    /// A cache entry was restored under the given key.
    Hit(String),
    /// No entry matched any key.
    Miss,
    /// Restore did not run.
    Skipped(String),
    /// Restore failed; the run continues without caches.
    Failed(String),
}

impl fmt::Display for RestoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit(key) => write!(f, "hit ({key})"),
            Self::Miss => write!(f, "miss"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}
