//! Check-mode status table.

use std::fmt::Write as _;

use console::{pad_str, style, Alignment};
use hfsync::human_size;
use hfsync::report::{StatusLabel, StatusRow};
use hfsync::StatusReport;

const RULE_WIDTH: usize = 110;
const STATUS_WIDTH: usize = 22;
const PATH_WIDTH: usize = 45;
const SIZE_WIDTH: usize = 10;

fn status_cell(label: &StatusLabel) -> String {
    let text = match label {
        StatusLabel::Complete => style(format!("✓ {}", label)).green(),
        StatusLabel::Missing => style(format!("○ {}", label)).dim(),
        StatusLabel::Incomplete { .. } => style(format!("◐ {}", label)).yellow(),
        StatusLabel::Suspicious => style(format!("✗ {}", label)).red(),
        StatusLabel::Unreadable => style(format!("? {}", label)).red(),
    };
    text.to_string()
}

fn render_row(out: &mut String, row: &StatusRow) {
    let status = status_cell(&row.label);
    let _ = writeln!(
        out,
        "{:>4}  {}  {}  {:>width$}  {}",
        row.index,
        pad_str(&status, STATUS_WIDTH, Alignment::Left, None),
        pad_str(&row.path, PATH_WIDTH, Alignment::Left, Some("…")),
        human_size(row.size),
        row.integrity,
        width = SIZE_WIDTH
    );
}

/// Quote a path for pasting into a shell when it contains whitespace.
fn shell_arg(path: &str) -> String {
    if path.chars().any(char::is_whitespace) {
        format!("'{}'", path)
    } else {
        path.to_string()
    }
}

/// Render the full check-mode report.
///
/// `rerun` is the command line that repeats this run without `--check`,
/// e.g. `hfsync org/name`.
pub fn render_report(report: &StatusReport, rerun: &str) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "\nFiles ({} total):", report.rows.len());
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    let _ = writeln!(
        out,
        "{:>4}  {}  {}  {:>width$}  {}",
        "#",
        pad_str("Status", STATUS_WIDTH, Alignment::Left, None),
        pad_str("File", PATH_WIDTH, Alignment::Left, None),
        "Size",
        "Integrity",
        width = SIZE_WIDTH
    );
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    for row in &report.rows {
        render_row(&mut out, row);
    }
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    let _ = writeln!(out, "Total size: {}", human_size(report.total_size));

    if !report.missing.is_empty() {
        let _ = writeln!(
            out,
            "\nMissing files ({}, {}):",
            report.missing.len(),
            human_size(report.missing_bytes())
        );
        for (path, size) in &report.missing {
            let _ = writeln!(out, "  - {} ({})", path, human_size(*size));
        }
    }

    if !report.incomplete.is_empty() {
        let remaining: u64 = report.incomplete.iter().map(|f| f.remaining_bytes()).sum();
        let _ = writeln!(
            out,
            "\nIncomplete files ({}, {} remaining):",
            report.incomplete.len(),
            human_size(remaining)
        );
        for file in &report.incomplete {
            let _ = writeln!(
                out,
                "  - {}: {} / {} ({:.1}%)",
                file.path,
                human_size(file.bytes_on_disk),
                human_size(file.expected_size),
                file.percent()
            );
        }
    }

    if !report.suspicious.is_empty() {
        let _ = writeln!(
            out,
            "\nSuspicious files ({}, {} to refetch):",
            report.suspicious.len(),
            human_size(report.suspicious_bytes())
        );
        for (path, detail) in &report.suspicious {
            let _ = writeln!(out, "  - {}: {}", path, detail);
        }
    }

    if !report.unreadable.is_empty() {
        let _ = writeln!(out, "\nUnreadable files ({}):", report.unreadable.len());
        for (path, reason) in &report.unreadable {
            let _ = writeln!(out, "  - {}: {}", path, reason);
        }
    }

    if report.verified_count > 0 {
        let _ = writeln!(
            out,
            "\nVerified with SHA256: {} files",
            report.verified_count
        );
    }

    if report.is_clean() {
        let _ = writeln!(
            out,
            "\n{}",
            style("All files are complete and verified").green().bold()
        );
        return out;
    }

    if !report.missing.is_empty() || !report.incomplete.is_empty() {
        let _ = writeln!(
            out,
            "\nTo download missing and incomplete files ({} remaining), run:",
            human_size(report.remaining_bytes())
        );
        let _ = writeln!(out, "  {}", rerun);
    }

    if !report.suspicious.is_empty() {
        let paths: Vec<String> = report
            .suspicious_paths()
            .into_iter()
            .map(shell_arg)
            .collect();
        let _ = writeln!(out, "\nTo re-download suspicious files, run:");
        let _ = writeln!(out, "  {} --force-files {}", rerun, paths.join(" "));
    }

    out
}
