//! Workflow commands and runner files.

use qodana_ci_core::env::EnvSnapshot;
use qodana_ci_core::host::RunnerHost;
use qodana_ci_core::pipeline::RunReport;
use qodana_ci_core::summary::render_markdown;
use qodana_ci_core::{Error, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::PROVIDER;

/// Escape data for a workflow command.
#[must_use]
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// GitHub Actions runner commands.
///
/// Workflow commands (`::error::`) go to `out`, which is stdout on a real
/// runner.
pub struct GitHubHost {
    path_file: Option<PathBuf>,
    summary_file: Option<PathBuf>,
    out: Mutex<Box<dyn Write + Send>>,
}

impl GitHubHost {
    /// Host writing commands to stdout.
    #[must_use]
    pub fn from_env(env: &EnvSnapshot) -> Self {
        Self::with_writer(env, Box::new(std::io::stdout()))
    }

    /// Host writing commands to `out`.
    #[must_use]
    pub fn with_writer(env: &EnvSnapshot, out: Box<dyn Write + Send>) -> Self {
        Self {
            path_file: env.non_empty("GITHUB_PATH").map(PathBuf::from),
            summary_file: env.non_empty("GITHUB_STEP_SUMMARY").map(PathBuf::from),
            out: Mutex::new(out),
        }
    }

    fn command(&self, line: &str) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| Error::host("runner", "command output lock poisoned"))?;
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

impl RunnerHost for GitHubHost {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn add_to_path(&self, dir: &Path) -> Result<()> {
        match &self.path_file {
            Some(file) => append_line(file, &dir.display().to_string()),
            None => {
                warn!(dir = %dir.display(), "GITHUB_PATH is not set; tool not added to PATH");
                Ok(())
            }
        }
    }

    fn report_failure(&self, message: &str) -> Result<()> {
        self.command(&format!("::error::{}", escape_data(message)))
    }

    fn publish_summary(&self, report: &RunReport) -> Result<()> {
        let Some(file) = &self.summary_file else {
            debug!("GITHUB_STEP_SUMMARY is not set; skipping job summary");
            return Ok(());
        };
        append_line(file, &render_markdown(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qodana_ci_core::args::Invocation;
    use qodana_ci_core::outcome::{RestoreOutcome, StepOutcome};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_escape_data() {
        assert_eq!(escape_data("50% done\r\nnext"), "50%25 done%0D%0Anext");
    }

    #[test]
    fn test_report_failure_emits_error_command() {
        let captured = Captured::default();
        let host = GitHubHost::with_writer(&EnvSnapshot::default(), Box::new(captured.clone()));
        host.report_failure("Checksum mismatch\nfor linux").unwrap();
        let out = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(out, "::error::Checksum mismatch%0Afor linux\n");
    }

    #[test]
    fn test_runner_files() {
        let dir = tempfile::tempdir().unwrap();
        let path_file = dir.path().join("path");
        let summary_file = dir.path().join("summary.md");
        let env: EnvSnapshot = [
            ("GITHUB_PATH", path_file.to_str().unwrap()),
            ("GITHUB_STEP_SUMMARY", summary_file.to_str().unwrap()),
        ]
        .into_iter()
        .collect();
        let host = GitHubHost::from_env(&env);

        host.add_to_path(Path::new("/opt/hostedtoolcache/qodana/2024.3.4/linux_x86_64"))
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path_file).unwrap(),
            "/opt/hostedtoolcache/qodana/2024.3.4/linux_x86_64\n"
        );

        let report = RunReport {
            exit_code: 0,
            invocation: Invocation {
                pull: vec!["pull".into()],
                scan: vec!["scan".into()],
            },
            results_dir: PathBuf::from("/tmp/res"),
            cache_restore: RestoreOutcome::Miss,
            cache_save: StepOutcome::Success,
            artifact: StepOutcome::Success,
        };
        host.publish_summary(&report).unwrap();
        assert!(
            std::fs::read_to_string(&summary_file)
                .unwrap()
                .contains("Qodana scan passed")
        );
    }

    #[test]
    fn test_missing_runner_files_are_not_fatal() {
        let host = GitHubHost::with_writer(&EnvSnapshot::default(), Box::new(std::io::sink()));
        assert!(host.add_to_path(Path::new("/bin")).is_ok());
    }
}
