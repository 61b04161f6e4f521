use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ScopeError;
use crate::process::{self, CancelToken, ProcessCommand, ProcessOutput};

/// Source of the changed-file set for restricted-scope runs.
pub trait ChangeSource: Send + Sync {
    /// Make sure `base` (remote-qualified, e.g. `origin/main`) is present
    /// locally with enough history to find a merge base with HEAD.
    fn fetch(&self, base: &str) -> Result<(), ScopeError>;

    /// Paths added, modified or deleted between the merge base of `base`
    /// and HEAD.
    fn changed_files(&self, base: &str) -> Result<Vec<String>, ScopeError>;
}

/// `ChangeSource` backed by the `git` CLI, run inside `repo_dir`.
///
/// `repo_dir` may be a subdirectory of the repository; changed paths are
/// reported relative to it.
#[derive(Debug, Clone)]
pub struct GitCli {
    pub repo_dir: PathBuf,
    pub timeout: Option<Duration>,
    pub cancel: CancelToken,
}

impl GitCli {
    pub fn new(repo_dir: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            timeout,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn command(&self, args: Vec<String>) -> ProcessCommand {
        ProcessCommand {
            program: "git".into(),
            args,
            cwd: self.repo_dir.clone(),
            timeout: self.timeout,
        }
    }

    /// Run git, turning a killed process into its own error. `on_spawn`
    /// maps any other spawn failure.
    fn git(
        &self,
        cmd: &ProcessCommand,
        on_spawn: impl FnOnce(std::io::Error) -> ScopeError,
    ) -> Result<ProcessOutput, ScopeError> {
        let out = process::run(cmd, &self.cancel).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ScopeError::GitUnavailable
            } else {
                on_spawn(e)
            }
        })?;
        if out.cancelled {
            return Err(ScopeError::Cancelled);
        }
        if out.timed_out {
            return Err(ScopeError::TimedOut {
                command: cmd.display_line(),
            });
        }
        Ok(out)
    }
}

impl ChangeSource for GitCli {
    fn fetch(&self, base: &str) -> Result<(), ScopeError> {
        let cmd = self.command(fetch_args(base)?);
        let out = self.git(&cmd, |e| ScopeError::FetchFailed {
            base: base.to_string(),
            stderr: e.to_string(),
        })?;
        if !out.success {
            return Err(ScopeError::FetchFailed {
                base: base.to_string(),
                stderr: out.stderr,
            });
        }
        Ok(())
    }

    fn changed_files(&self, base: &str) -> Result<Vec<String>, ScopeError> {
        let cmd = self.command(diff_args(base));
        let out = self.git(&cmd, |e| ScopeError::DiffFailed {
            stderr: e.to_string(),
        })?;
        if !out.success {
            return Err(ScopeError::DiffFailed { stderr: out.stderr });
        }
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }
}

/// `git fetch <remote> <branch>` for a remote-qualified ref.
pub fn fetch_args(base: &str) -> Result<Vec<String>, ScopeError> {
    let Some((remote, branch)) = base.split_once('/') else {
        return Err(ScopeError::UnqualifiedRef(base.to_string()));
    };
    if remote.is_empty() || branch.is_empty() {
        return Err(ScopeError::UnqualifiedRef(base.to_string()));
    }
    Ok(vec!["fetch".into(), remote.into(), branch.into()])
}

/// `git diff --relative --name-only <base>...HEAD`: three dots diff from the
/// merge base, paths relative to the working directory and limited to it.
pub fn diff_args(base: &str) -> Vec<String> {
    vec![
        "diff".into(),
        "--relative".into(),
        "--name-only".into(),
        format!("{base}...HEAD"),
    ]
}
