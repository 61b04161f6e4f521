use std::fmt::Write as _;
use std::path::Path;

use similar::{ChangeTag, TextDiff};

use crate::error::ValidationError;

/// Label for the freshly compiled side of a diff.
pub const COMPILED_LABEL: &str = "(compiled)";

const CONTEXT_RADIUS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Context(String),
    Insert(String),
    Delete(String),
    HunkHeader(String),
}

/// Result of comparing a compiled artifact with the checked-in one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    Identical,
    Mismatch(FileDiff),
}

/// Unified diff between the expected (before) and compiled (after) artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub expected_label: String,
    pub compiled_label: String,
    pub lines: Vec<DiffLine>,
}

impl FileDiff {
    pub fn insertions(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, DiffLine::Insert(_)))
            .count()
    }

    pub fn deletions(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, DiffLine::Delete(_)))
            .count()
    }

    /// Render as plain unified-diff text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--- {}", self.expected_label);
        let _ = writeln!(out, "+++ {}", self.compiled_label);
        for line in &self.lines {
            let _ = match line {
                DiffLine::HunkHeader(h) => writeln!(out, "{h}"),
                DiffLine::Context(s) => writeln!(out, " {s}"),
                DiffLine::Delete(s) => writeln!(out, "-{s}"),
                DiffLine::Insert(s) => writeln!(out, "+{s}"),
            };
        }
        out
    }
}

/// Compare the compiled output at `compiled` against the checked-in
/// artifact at `expected`. Equality is exact byte equality.
pub fn compare_artifacts(compiled: &Path, expected: &Path) -> Result<DiffOutcome, ValidationError> {
    if !expected.is_file() {
        return Err(ValidationError::ArtifactMissing(expected.to_path_buf()));
    }
    let read = |path: &Path| {
        std::fs::read(path).map_err(|source| ValidationError::Read {
            path: path.to_path_buf(),
            source,
        })
    };
    let expected_bytes = read(expected)?;
    let compiled_bytes = read(compiled)?;

    if expected_bytes == compiled_bytes {
        return Ok(DiffOutcome::Identical);
    }

    let before = String::from_utf8_lossy(&expected_bytes);
    let after = String::from_utf8_lossy(&compiled_bytes);
    Ok(DiffOutcome::Mismatch(FileDiff {
        expected_label: expected.display().to_string(),
        compiled_label: COMPILED_LABEL.to_string(),
        lines: make_unified_diff(&before, &after),
    }))
}

fn make_unified_diff(old: &str, new: &str) -> Vec<DiffLine> {
    let text_diff = TextDiff::from_lines(old, new);
    let mut lines = Vec::new();

    for hunk in text_diff
        .unified_diff()
        .context_radius(CONTEXT_RADIUS)
        .iter_hunks()
    {
        lines.push(DiffLine::HunkHeader(format!("{}", hunk.header())));
        for change in hunk.iter_changes() {
            let text = change.value().trim_end_matches('\n').to_string();
            match change.tag() {
                ChangeTag::Equal => lines.push(DiffLine::Context(text)),
                ChangeTag::Insert => lines.push(DiffLine::Insert(text)),
                ChangeTag::Delete => lines.push(DiffLine::Delete(text)),
            }
        }
    }

    // Distinct invalid UTF-8 sequences collapse to the same lossy text.
    if lines.is_empty() {
        lines.push(DiffLine::HunkHeader(
            "@@ files differ only in non-UTF-8 bytes @@".into(),
        ));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::PathBuf;

    fn write_pair(expected: &str, compiled: &str) -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let e = dir.path().join("p.yaml");
        let c = dir.path().join("compiled.yaml");
        fs::write(&e, expected).unwrap();
        fs::write(&c, compiled).unwrap();
        (dir, e, c)
    }

    #[test]
    fn identical_files_pass() {
        let (_dir, e, c) = write_pair("a: 1\nb: 2\n", "a: 1\nb: 2\n");
        assert_eq!(compare_artifacts(&c, &e).unwrap(), DiffOutcome::Identical);
    }

    #[test]
    fn missing_expected_artifact_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let c = dir.path().join("compiled.yaml");
        fs::write(&c, "x").unwrap();
        let err = compare_artifacts(&c, &dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, ValidationError::ArtifactMissing(_)));
        assert!(err.to_string().contains("missing.yaml"));
    }

    #[test]
    fn single_line_change_shows_delete_then_insert() {
        let (_dir, e, c) = write_pair("name: old\nx: 1\n", "name: new\nx: 1\n");
        let DiffOutcome::Mismatch(diff) = compare_artifacts(&c, &e).unwrap() else {
            panic!("expected mismatch");
        };
        assert_eq!(diff.deletions(), 1);
        assert_eq!(diff.insertions(), 1);
        let del = diff
            .lines
            .iter()
            .position(|l| *l == DiffLine::Delete("name: old".into()))
            .unwrap();
        let ins = diff
            .lines
            .iter()
            .position(|l| *l == DiffLine::Insert("name: new".into()))
            .unwrap();
        assert!(del < ins);
        assert_eq!(diff.compiled_label, COMPILED_LABEL);
    }

    #[test]
    fn render_is_unified_format() {
        let (_dir, e, c) = write_pair("a\nb\nc\n", "a\nB\nc\n");
        let DiffOutcome::Mismatch(diff) = compare_artifacts(&c, &e).unwrap() else {
            panic!("expected mismatch");
        };
        let text = diff.render();
        let expected_header = format!("--- {}\n+++ (compiled)\n", e.display());
        assert!(text.starts_with(&expected_header));
        assert!(text.contains("@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n"));
    }

    #[test]
    fn render_is_deterministic() {
        let (_dir, e, c) = write_pair("k: 1\nv: 2\n", "k: 1\nv: 3\n");
        let first = compare_artifacts(&c, &e).unwrap();
        let second = compare_artifacts(&c, &e).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn trailing_newline_difference_is_a_mismatch() {
        let (_dir, e, c) = write_pair("a: 1\n", "a: 1");
        assert!(matches!(
            compare_artifacts(&c, &e).unwrap(),
            DiffOutcome::Mismatch(_)
        ));
    }
}
