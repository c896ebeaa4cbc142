//! Error types for qodana-ci operations.
//!
//! Only acquisition, configuration and the tool's `pull` stage produce
//! errors. Cache and artifact failures never surface here; they are
//! reported through [`crate::outcome::StepOutcome`] instead.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for qodana-ci operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a qodana-ci run.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Invalid or conflicting configuration.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(qodana_ci::config))]
    Configuration {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },

    /// The host architecture or operating system has no published tool package.
    #[error("Unsupported platform: {platform}")]
    #[diagnostic(
        code(qodana_ci::unsupported_platform),
        help("Qodana CLI is published for linux, darwin and windows on x86_64 and arm64")
    )]
    UnsupportedPlatform {
        /// Description of the host platform
        platform: String,
    },

    /// Downloading the tool archive failed.
    #[error("Failed to download {url}: {message}")]
    #[diagnostic(
        code(qodana_ci::download),
        help("Check network access to github.com from the build agent")
    )]
    Download {
        /// The URL that was requested
        url: String,
        /// Error message
        message: String,
    },

    /// The downloaded archive did not hash to the registered value.
    #[error(
        "Checksum mismatch for {platform}: expected {expected}, got {actual}"
    )]
    #[diagnostic(
        code(qodana_ci::checksum_mismatch),
        help("The download may be corrupt or tampered with; it will not be executed")
    )]
    ChecksumMismatch {
        /// The (os, arch) pair of the archive
        platform: String,
        /// The registered hash
        expected: String,
        /// The computed hash
        actual: String,
    },

    /// No expected checksum is known for the host platform.
    #[error("No checksum registered for {platform}")]
    #[diagnostic(
        code(qodana_ci::checksum_unknown),
        help("Provide the expected SHA-256 through the `checksum` input")
    )]
    ChecksumUnknown {
        /// The (os, arch) pair of the archive
        platform: String,
    },

    /// Extracting the tool archive failed.
    #[error("Failed to extract {}: {message}", path.display())]
    #[diagnostic(code(qodana_ci::extraction))]
    Extraction {
        /// The archive path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// The tool process could not be started.
    #[error("Failed to start {program}: {source}")]
    #[diagnostic(code(qodana_ci::spawn))]
    Spawn {
        /// The executable that was launched
        program: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// `qodana pull` exited with a nonzero code.
    #[error("qodana pull failed with exit code {exit_code}")]
    #[diagnostic(
        code(qodana_ci::pull_failed),
        help("The analysis engine could not be prepared; no scan was run")
    )]
    PullFailed {
        /// The process exit code
        exit_code: i32,
    },

    /// A host CI service call failed.
    #[error("{service} error: {message}")]
    #[diagnostic(code(qodana_ci::host))]
    Host {
        /// The host service (e.g. "cache", "artifact")
        service: &'static str,
        /// Error message
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    #[diagnostic(code(qodana_ci::io))]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    #[diagnostic(code(qodana_ci::json))]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text.
    #[must_use]
    pub fn configuration_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a download error.
    #[must_use]
    pub fn download(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a checksum mismatch error.
    #[must_use]
    pub fn checksum_mismatch(
        platform: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ChecksumMismatch {
            platform: platform.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an extraction error.
    #[must_use]
    pub fn extraction(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a host service error.
    #[must_use]
    pub fn host(service: &'static str, message: impl Into<String>) -> Self {
        Self::Host {
            service,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_names_both_hashes() {
        let err = Error::checksum_mismatch("linux_x86_64", "aaaa", "bbbb");
        let msg = err.to_string();
        assert!(msg.contains("aaaa"));
        assert!(msg.contains("bbbb"));
        assert!(msg.contains("linux_x86_64"));
    }

    #[test]
    fn test_pull_failed_message() {
        let err = Error::PullFailed { exit_code: 3 };
        assert_eq!(err.to_string(), "qodana pull failed with exit code 3");
    }

    #[test]
    fn test_configuration_help() {
        let err = Error::configuration_with_help("bad input", "fix it");
        match err {
            Error::Configuration { message, help } => {
                assert_eq!(message, "bad input");
                assert_eq!(help.as_deref(), Some("fix it"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
