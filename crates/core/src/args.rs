//! Qodana CLI argument vectors.
//!
//! Pure functions: the same request always yields the same vectors.

use serde::Serialize;
use std::path::Path;

use crate::context::RunContext;

/// Flag that pins the commit the tool diffs against.
pub const COMMIT_FLAG: &str = "--commit";

/// Prefix the tool expects on CI-provided commit overrides.
pub const CI_COMMIT_PREFIX: &str = "CI";

/// Flags whose values select the analysis engine and must reach `pull`.
const ENGINE_FLAGS: &[(&str, &str)] = &[
    ("-l", "--linter"),
    ("-i", "--project-dir"),
    ("--config", "--config"),
];

/// Flags that already fix the diff scope; no override is injected next to them.
const DIFF_SCOPE_FLAGS: &[&str] = &[COMMIT_FLAG, "--diff-start"];

/// How the scan is scoped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanMode {
    /// Analyse the whole project.
    Full,
    /// Analyse changes relative to a pull request's base commit.
    PullRequest {
        /// Base commit of the pull request.
        base_sha: String,
    },
}

impl ScanMode {
    /// Choose the mode from the `pr-mode` input and the run context.
    ///
    /// PR mode without a pull request in the context is a full scan.
    #[must_use]
    pub fn resolve(pr_mode: bool, context: &RunContext) -> Self {
        match (&context.pull_request, pr_mode) {
            (Some(pr), true) if !pr.base_sha.is_empty() => Self::PullRequest {
                base_sha: pr.base_sha.clone(),
            },
            _ => Self::Full,
        }
    }
}

/// Everything the builder needs.
#[derive(Debug, Clone)]
pub struct ArgsRequest<'a> {
    /// User-supplied pass-through arguments.
    pub user_args: &'a [String],
    /// Passed as `--results-dir`.
    pub results_dir: &'a Path,
    /// Passed as `--cache-dir`.
    pub cache_dir: &'a Path,
    /// Full or pull request scan.
    pub mode: ScanMode,
    /// Complete scan arguments supplied by the caller; bypasses derivation.
    pub explicit: Option<&'a [String]>,
}

/// The two tool invocations of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    /// Arguments for `qodana pull`.
    pub pull: Vec<String>,
    /// Arguments for `qodana scan`.
    pub scan: Vec<String>,
}

impl Invocation {
    /// Build both argument vectors.
    #[must_use]
    pub fn build(request: &ArgsRequest<'_>) -> Self {
        if let Some(explicit) = request.explicit {
            return Self {
                pull: pull_args(explicit),
                scan: explicit.to_vec(),
            };
        }
        Self {
            pull: pull_args(request.user_args),
            scan: scan_args(
                request.user_args,
                request.results_dir,
                request.cache_dir,
                &request.mode,
            ),
        }
    }
}

/// `pull` followed by the engine-selecting options found in `user_args`.
#[must_use]
pub fn pull_args(user_args: &[String]) -> Vec<String> {
    let mut args = vec!["pull".to_string()];
    for (short, long) in ENGINE_FLAGS {
        if let Some(value) = extract_arg(user_args, short, long) {
            args.push((*long).to_string());
            args.push(value);
        }
    }
    args
}

/// `scan` with cache and results directories, user arguments and, for
/// pull requests, the commit override.
#[must_use]
pub fn scan_args(
    user_args: &[String],
    results_dir: &Path,
    cache_dir: &Path,
    mode: &ScanMode,
) -> Vec<String> {
    let mut args = vec![
        "scan".to_string(),
        "--cache-dir".to_string(),
        cache_dir.display().to_string(),
        "--results-dir".to_string(),
        results_dir.display().to_string(),
    ];
    args.extend(user_args.iter().cloned());

    if let ScanMode::PullRequest { base_sha } = mode
        && !has_any_flag(user_args, DIFF_SCOPE_FLAGS)
    {
        args.push(COMMIT_FLAG.to_string());
        args.push(format!("{CI_COMMIT_PREFIX}{base_sha}"));
    }
    args
}

/// Value of `short`/`long` in `args`, supporting `--flag value` and `--flag=value`.
#[must_use]
pub fn extract_arg(args: &[String], short: &str, long: &str) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == short || arg == long {
            return iter.next().cloned();
        }
        for flag in [short, long] {
            if let Some(value) = arg
                .strip_prefix(flag)
                .and_then(|rest| rest.strip_prefix('='))
            {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn has_any_flag(args: &[String], flags: &[&str]) -> bool {
    args.iter().any(|arg| {
        flags.iter().any(|flag| {
            arg == flag
                || arg
                    .strip_prefix(flag)
                    .is_some_and(|rest| rest.starts_with('='))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PullRequest;
    use std::path::PathBuf;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_non_pr_scan_args_end_with_dirs_and_baseline() {
        let user = strings(&["--baseline", "qodana.sarif.json"]);
        let args = scan_args(
            &user,
            Path::new("/tmp/res"),
            Path::new("/tmp/cache"),
            &ScanMode::Full,
        );
        assert_eq!(
            args,
            strings(&[
                "scan",
                "--cache-dir",
                "/tmp/cache",
                "--results-dir",
                "/tmp/res",
                "--baseline",
                "qodana.sarif.json",
            ])
        );
        assert!(!args.contains(&COMMIT_FLAG.to_string()));
    }

    #[test]
    fn test_pr_mode_appends_commit_override() {
        let args = scan_args(
            &[],
            Path::new("/r"),
            Path::new("/c"),
            &ScanMode::PullRequest {
                base_sha: "abc123".to_string(),
            },
        );
        assert_eq!(&args[args.len() - 2..], &strings(&["--commit", "CIabc123"])[..]);
    }

    #[test]
    fn test_user_commit_flag_suppresses_override() {
        let mode = ScanMode::PullRequest {
            base_sha: "abc".to_string(),
        };
        for user in [
            strings(&["--commit", "deadbeef"]),
            strings(&["--commit=deadbeef"]),
            strings(&["--diff-start", "deadbeef"]),
        ] {
            let args = scan_args(&user, Path::new("/r"), Path::new("/c"), &mode);
            assert!(!args.contains(&"CIabc".to_string()), "{args:?}");
        }
    }

    #[test]
    fn test_scan_mode_resolve() {
        let mut ctx = RunContext::local(PathBuf::from("/tmp"));
        assert_eq!(ScanMode::resolve(true, &ctx), ScanMode::Full);

        ctx.pull_request = Some(PullRequest {
            base_sha: "base".to_string(),
            base_ref: Some("main".to_string()),
        });
        assert_eq!(
            ScanMode::resolve(true, &ctx),
            ScanMode::PullRequest {
                base_sha: "base".to_string()
            }
        );
        assert_eq!(ScanMode::resolve(false, &ctx), ScanMode::Full);
    }

    #[test]
    fn test_pull_args_extracts_engine_flags() {
        let user = strings(&[
            "-l",
            "jetbrains/qodana-jvm:2024.3",
            "--project-dir=app",
            "--baseline",
            "b.sarif.json",
            "--config",
            "qodana.yaml",
        ]);
        assert_eq!(
            pull_args(&user),
            strings(&[
                "pull",
                "--linter",
                "jetbrains/qodana-jvm:2024.3",
                "--project-dir",
                "app",
                "--config",
                "qodana.yaml",
            ])
        );
        assert_eq!(pull_args(&[]), strings(&["pull"]));
    }

    #[test]
    fn test_extract_arg_missing_value() {
        assert_eq!(extract_arg(&strings(&["-l"]), "-l", "--linter"), None);
        assert_eq!(
            extract_arg(&strings(&["--linterx", "y"]), "-l", "--linter"),
            None
        );
    }

    #[test]
    fn test_explicit_args_bypass_derivation() {
        let explicit = strings(&["scan", "--print-problems"]);
        let user = strings(&["--baseline", "x"]);
        let a = Invocation::build(&ArgsRequest {
            user_args: &user,
            results_dir: Path::new("/a"),
            cache_dir: Path::new("/b"),
            mode: ScanMode::PullRequest {
                base_sha: "s".to_string(),
            },
            explicit: Some(&explicit),
        });
        let b = Invocation::build(&ArgsRequest {
            user_args: &[],
            results_dir: Path::new("/other"),
            cache_dir: Path::new("/other-cache"),
            mode: ScanMode::Full,
            explicit: Some(&explicit),
        });
        assert_eq!(a.scan, explicit);
        assert_eq!(a, b);
    }

    #[test]
    fn test_build_is_deterministic() {
        let user = strings(&["-l", "jetbrains/qodana-js"]);
        let request = ArgsRequest {
            user_args: &user,
            results_dir: Path::new("/r"),
            cache_dir: Path::new("/c"),
            mode: ScanMode::Full,
            explicit: None,
        };
        assert_eq!(Invocation::build(&request), Invocation::build(&request));
    }
}
