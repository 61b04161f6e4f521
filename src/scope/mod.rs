//! Change-set resolution: which map entries a run validates.

pub mod git;

use std::collections::HashSet;
use std::path::Path;

use crate::error::ScopeError;
use crate::mapping::MapEntry;

pub use git::{ChangeSource, GitCli};

/// Which entries are in scope for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    /// No filter: every entry is validated.
    All,
    /// Only entries whose source or artifact path is in the set.
    Changed(HashSet<String>),
}

impl ScopeFilter {
    pub fn changed<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Changed(
            paths
                .into_iter()
                .map(|p| normalize_path(p.as_ref()))
                .collect(),
        )
    }

    pub fn includes(&self, entry: &MapEntry) -> bool {
        match self {
            Self::All => true,
            Self::Changed(paths) => {
                paths.contains(&normalize(&entry.source))
                    || paths.contains(&normalize(&entry.artifact))
            }
        }
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

/// Qualify a bare branch name with `origin/` so fetch and diff use the same
/// ref. Refs that already name a remote are returned unchanged.
pub fn normalize_base_ref(base_ref: &str) -> String {
    if base_ref.contains('/') {
        base_ref.to_string()
    } else {
        format!("origin/{base_ref}")
    }
}

/// Compute the scope filter for a run.
///
/// Unrestricted runs never touch version control. Restricted runs require a
/// base ref and fail rather than widen to all files when git does.
pub fn resolve_scope(
    restricted: bool,
    base_ref: Option<&str>,
    source: &dyn ChangeSource,
) -> Result<ScopeFilter, ScopeError> {
    if !restricted {
        return Ok(ScopeFilter::All);
    }

    let base_ref = base_ref
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or(ScopeError::MissingBaseRef)?;
    let base = normalize_base_ref(base_ref);

    source.fetch(&base)?;
    let changed = source.changed_files(&base)?;
    tracing::info!(%base, changed = changed.len(), "resolved changed files");

    Ok(ScopeFilter::changed(changed))
}

fn normalize(path: &Path) -> String {
    normalize_path(&path.to_string_lossy())
}

/// Repo-relative, forward slashes, no leading `./`.
fn normalize_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut rest = unified.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records calls and returns a canned change set.
    #[derive(Default)]
    struct FakeGit {
        changed: Vec<String>,
        fail_fetch: bool,
        calls: Mutex<Vec<String>>,
    }

    impl ChangeSource for FakeGit {
        fn fetch(&self, base: &str) -> Result<(), ScopeError> {
            self.calls.lock().unwrap().push(format!("fetch {base}"));
            if self.fail_fetch {
                return Err(ScopeError::FetchFailed {
                    base: base.into(),
                    stderr: "fatal: couldn't find remote ref".into(),
                });
            }
            Ok(())
        }

        fn changed_files(&self, base: &str) -> Result<Vec<String>, ScopeError> {
            self.calls.lock().unwrap().push(format!("diff {base}"));
            Ok(self.changed.clone())
        }
    }

    #[test]
    fn unrestricted_is_all_without_git() {
        let git = FakeGit::default();
        let scope = resolve_scope(false, None, &git).unwrap();
        assert_eq!(scope, ScopeFilter::All);
        assert!(git.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn restricted_requires_base_ref() {
        let git = FakeGit::default();
        assert!(matches!(
            resolve_scope(true, None, &git),
            Err(ScopeError::MissingBaseRef)
        ));
        assert!(matches!(
            resolve_scope(true, Some("  "), &git),
            Err(ScopeError::MissingBaseRef)
        ));
    }

    #[test]
    fn bare_branch_is_qualified_for_fetch_and_diff() {
        let git = FakeGit {
            changed: vec!["a.py".into()],
            ..FakeGit::default()
        };
        resolve_scope(true, Some("main"), &git).unwrap();
        assert_eq!(
            *git.calls.lock().unwrap(),
            vec!["fetch origin/main".to_string(), "diff origin/main".to_string()]
        );
    }

    #[test]
    fn qualified_ref_is_kept() {
        assert_eq!(normalize_base_ref("upstream/develop"), "upstream/develop");
        assert_eq!(normalize_base_ref("develop"), "origin/develop");
    }

    #[test]
    fn fetch_failure_is_fatal() {
        let git = FakeGit {
            fail_fetch: true,
            ..FakeGit::default()
        };
        let err = resolve_scope(true, Some("main"), &git).unwrap_err();
        assert!(err.to_string().contains("git fetch failed for origin/main"));
    }

    #[test]
    fn filter_matches_source_or_artifact() {
        let scope = ScopeFilter::changed(["pipelines/a.py", "./out/b.yaml"]);
        assert!(scope.includes(&MapEntry::new("pipelines/a.py", "out/a.yaml")));
        assert!(scope.includes(&MapEntry::new("./pipelines/b.py", "out/b.yaml")));
        assert!(!scope.includes(&MapEntry::new("pipelines/c.py", "out/c.yaml")));
        assert!(scope.is_restricted());
    }

    #[test]
    fn all_includes_everything() {
        assert!(ScopeFilter::All.includes(&MapEntry::new("x.py", "x.yaml")));
        assert!(!ScopeFilter::All.is_restricted());
    }
}
