//! Markdown run summary shared by the host providers.

use std::fmt::Write;

use crate::pipeline::RunReport;

/// Render a short markdown summary of a run.
#[must_use]
pub fn render_markdown(report: &RunReport) -> String {
    let mut md = String::new();
    let status = if report.is_success() {
        "✅ Qodana scan passed".to_string()
    } else {
        format!("❌ Qodana scan failed (exit code {})", report.exit_code)
    };

    // Writing to a String cannot fail.
    let _ = writeln!(md, "## {status}\n");
    let _ = writeln!(md, "| Step | Result |");
    let _ = writeln!(md, "|------|--------|");
    let _ = writeln!(md, "| Cache restore | {} |", report.cache_restore);
    let _ = writeln!(md, "| Results upload | {} |", report.artifact);
    let _ = writeln!(md, "| Cache save | {} |", report.cache_save);
    let _ = writeln!(
        md,
        "\nReports were written to `{}`.",
        report.results_dir.display()
    );
    md
}
