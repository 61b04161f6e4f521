use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::mapping::MapEntry;
use crate::pipeline::{EntryResult, Outcome, RunReport};

/// `→ Checking a.py → a.yaml`
pub fn checking_line(entry: &MapEntry) -> String {
    format!(
        "→ Checking {} → {}",
        entry.source.display(),
        entry.artifact.display()
    )
}

/// One status line per entry, e.g. `FAIL    a.py → a.yaml (out of date)`.
pub fn entry_line(result: &EntryResult) -> String {
    let mut line = format!(
        "{:<8}{} → {}",
        result.outcome.label(),
        result.source.display(),
        result.artifact.display()
    );
    if let Outcome::Fail { reason, .. } = &result.outcome {
        let _ = write!(line, " ({reason})");
    }
    line
}

/// Detail block for every failing entry: diff or error text, plus the
/// regeneration command when there is one.
pub fn render_failures(report: &RunReport) -> String {
    let mut out = String::new();
    for result in report.failures() {
        let Outcome::Fail {
            reason,
            detail,
            fix_hint,
        } = &result.outcome
        else {
            continue;
        };
        let _ = writeln!(
            out,
            "❌ {} → {}: {reason}",
            result.source.display(),
            result.artifact.display()
        );
        for line in detail.lines() {
            let _ = writeln!(out, "   {line}");
        }
        if let Some(hint) = fix_hint {
            let _ = writeln!(out, "   → update by running:");
            let _ = writeln!(out, "     {hint}");
        }
    }
    out
}

pub fn summary_line(report: &RunReport) -> String {
    let s = &report.summary;
    let verdict = if report.success() { "✅" } else { "❌" };
    format!(
        "{verdict} {} passed, {} failed, {} skipped ({} total)",
        s.passed, s.failed, s.skipped, s.total
    )
}

/// Write the report as pretty JSON.
pub fn write_json(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{FailReason, Summary};

    fn failing_report() -> RunReport {
        let entries = vec![
            EntryResult::new(&MapEntry::new("a.py", "a.yaml"), Outcome::Pass),
            EntryResult::new(
                &MapEntry::new("b.py", "b.yaml"),
                Outcome::Fail {
                    reason: FailReason::OutOfDate,
                    detail: "--- b.yaml\n+++ (compiled)\n-x: 1\n+x: 2\n".into(),
                    fix_hint: Some("kfp dsl compile --py b.py --output b.yaml".into()),
                },
            ),
            EntryResult::new(&MapEntry::new("c.py", "c.yaml"), Outcome::Skipped),
        ];
        RunReport {
            map_file: "map.json".into(),
            summary: Summary::from_results(&entries),
            entries,
            ..RunReport::default()
        }
    }

    #[test]
    fn entry_lines_show_status_and_reason() {
        let report = failing_report();
        assert_eq!(entry_line(&report.entries[0]), "PASS    a.py → a.yaml");
        assert_eq!(
            entry_line(&report.entries[1]),
            "FAIL    b.py → b.yaml (out of date)"
        );
        assert_eq!(entry_line(&report.entries[2]), "SKIPPED c.py → c.yaml");
    }

    #[test]
    fn failures_include_diff_and_hint() {
        let text = render_failures(&failing_report());
        assert!(text.starts_with("❌ b.py → b.yaml: out of date\n"));
        assert!(text.contains("   -x: 1\n   +x: 2\n"));
        assert!(text.contains("update by running:"));
        assert!(text.contains("kfp dsl compile --py b.py --output b.yaml"));
        assert!(!text.contains("a.py"));
    }

    #[test]
    fn summary_counts_outcomes() {
        assert_eq!(
            summary_line(&failing_report()),
            "❌ 1 passed, 1 failed, 1 skipped (3 total)"
        );
    }

    #[test]
    fn json_report_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_json(&failing_report(), &path).unwrap();
        let back: RunReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.summary.failed, 1);
        assert_eq!(back.entries, failing_report().entries);
    }
}
