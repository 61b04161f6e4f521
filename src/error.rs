use std::path::PathBuf;

use thiserror::Error;

/// The pipeline map file is missing or malformed. Always fatal.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Pipeline map file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Cannot read map file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {}: {source}", .path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Pipeline map must be a JSON object (source -> artifact), got {found}")]
    NotAnObject { found: &'static str },
    #[error("Pipeline map {} is empty", .0.display())]
    Empty(PathBuf),
    #[error("Pipeline map entries must be strings (source -> artifact), got non-string value for {key:?}")]
    NonStringValue { key: String },
    #[error("Pipeline map entries must be non-empty paths, got empty {side} in entry {key:?}")]
    EmptyPath { key: String, side: &'static str },
    #[error("Pipeline map lists source {0:?} more than once")]
    DuplicateSource(String),
}

/// The changed-file set could not be computed. Always fatal.
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error(
        "--modified-only requires GITHUB_BASE_REF environment variable \
         (set automatically on pull_request events)"
    )]
    MissingBaseRef,
    #[error("base ref must be remote-qualified (e.g. 'origin/main'), got: {0:?}")]
    UnqualifiedRef(String),
    #[error("git is not installed or not on PATH")]
    GitUnavailable,
    #[error("git fetch failed for {base}{}", stderr_suffix(.stderr))]
    FetchFailed { base: String, stderr: String },
    #[error("git diff failed{}", stderr_suffix(.stderr))]
    DiffFailed { stderr: String },
    #[error("`{command}` timed out")]
    TimedOut { command: String },
    #[error("git was interrupted")]
    Cancelled,
}

/// The compiler could not produce an artifact for one entry.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Source file not found: {}", .0.display())]
    SourceMissing(PathBuf),
    #[error("failed to start compiler `{program}`: {message}")]
    Spawn { program: String, message: String },
    #[error(
        "compile failed for {} (exit {}){}",
        .source_path.display(),
        exit_label(.exit_code),
        stderr_suffix(.stderr)
    )]
    Failed {
        source_path: PathBuf,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("compile timed out for {}", .0.display())]
    TimedOut(PathBuf),
    #[error("compile interrupted for {}", .0.display())]
    Cancelled(PathBuf),
    #[error("compiler exited successfully but wrote no output for {}", .0.display())]
    NoOutput(PathBuf),
    #[error("failed to prepare compile output directory: {0}")]
    TempDir(#[source] std::io::Error),
}

/// The checked-in artifact could not be compared for one entry.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Expected artifact missing: {}", .0.display())]
    ArtifactMissing(PathBuf),
    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The package installer failed before validation started.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Requirements file not found: {}", .0.display())]
    RequirementsMissing(PathBuf),
    #[error("failed to start installer `{program}`: {message}")]
    Spawn { program: String, message: String },
    #[error("dependency install failed (exit {}){}", exit_label(.exit_code), stderr_suffix(.stderr))]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("dependency install timed out")]
    TimedOut,
    #[error("dependency install interrupted")]
    Cancelled,
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error("interrupted; validation stopped")]
    Cancelled,
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{trimmed}")
    }
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}
