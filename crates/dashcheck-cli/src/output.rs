//! Terminal output: report coloring and destination

use console::style;
use dashcheck::Phase;
use std::fmt::Write as _;
use std::path::Path;

/// Colors rendered text reports line by line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Painter {
    use_color: bool,
}

impl Painter {
    /// Create a painter
    #[must_use]
    pub const fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    /// Color a whole report; JSON and plain output pass through unchanged
    #[must_use]
    pub fn paint(&self, report: &str) -> String {
        if !self.use_color || report.trim_start().starts_with('{') {
            return report.to_string();
        }
        let mut out = String::with_capacity(report.len());
        for line in report.lines() {
            let _ = writeln!(out, "{}", self.paint_line(line));
        }
        out
    }

    fn paint_line(&self, line: &str) -> String {
        let trimmed = line.trim_start();
        let styled = if trimmed.starts_with("[PASS]") {
            style(line).green()
        } else if trimmed.starts_with("[FAIL]") {
            style(line).red()
        } else if trimmed.starts_with("[SKIP]") {
            style(line).yellow()
        } else if line.starts_with("== ") {
            style(line).bold()
        } else if line.starts_with("RESULT: PASS") {
            style(line).green().bold()
        } else if line.starts_with("RESULT: ") || line.starts_with("FATAL: ") {
            style(line).red().bold()
        } else {
            return line.to_string();
        };
        styled.force_styling(true).to_string()
    }
}

/// Phase catalogue listing for `--list-phases`
#[must_use]
pub fn phase_listing(phases: &[Phase]) -> String {
    let mut out = String::new();
    for phase in phases {
        let _ = writeln!(out, "{} ({})", phase.key, phase.name);
        for check in &phase.checks {
            let _ = writeln!(out, "  {}  {}", check.id, check.description);
        }
    }
    out
}

/// Write a report to `path`, or to stdout when no path is given
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written.
pub fn emit(report: &str, path: Option<&Path>) -> std::io::Result<()> {
    match path {
        Some(path) => std::fs::write(path, report),
        None => {
            print!("{report}");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use dashcheck::{CheckSpec, Probe};

    const REPORT: &str = "== API Cross-Check ==\n  [FAIL] api.health  status \"down\"\nRESULT: FAIL (0 passed, 1 failed, 0 skipped of 1)\n";

    #[test]
    fn test_plain_is_unchanged() {
        assert_eq!(Painter::new(false).paint(REPORT), REPORT);
    }

    #[test]
    fn test_colored_keeps_text() {
        let painted = Painter::new(true).paint(REPORT);
        assert_ne!(painted, REPORT);
        assert_eq!(console::strip_ansi_codes(&painted), REPORT);
    }

    #[test]
    fn test_json_is_never_colored() {
        let json = "{\n  \"status\": {}\n}";
        assert_eq!(Painter::new(true).paint(json), json);
    }

    #[test]
    fn test_phase_listing() {
        let phase = Phase::new("instrumentation", "Instrumentation").with_check(CheckSpec::new(
            "instrumentation.no_page_errors",
            "no uncaught page error was captured",
            Probe::NoPageErrors,
        ));
        let text = phase_listing(&[phase]);
        assert!(text.starts_with("instrumentation (Instrumentation)\n"));
        assert!(text.contains("  instrumentation.no_page_errors  no uncaught"));
    }

    #[test]
    fn test_emit_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        emit(REPORT, Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), REPORT);
    }
}
