use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::PipelineError;
use crate::mapping::MapEntry;
use crate::process::CancelToken;

/// Why an entry failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    SourceMissing,
    ArtifactMissing,
    CompileFailed,
    OutOfDate,
    Io,
}

impl FailReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailReason::SourceMissing => "source missing",
            FailReason::ArtifactMissing => "artifact missing",
            FailReason::CompileFailed => "compile failed",
            FailReason::OutOfDate => "out of date",
            FailReason::Io => "i/o error",
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Skipped,
    Fail {
        reason: FailReason,
        /// Diff text or captured error output.
        detail: String,
        /// Command that regenerates the artifact, for out-of-date entries.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fix_hint: Option<String>,
    },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Pass => "PASS",
            Outcome::Skipped => "SKIPPED",
            Outcome::Fail { .. } => "FAIL",
        }
    }
}

/// Result of validating one map entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryResult {
    pub source: PathBuf,
    pub artifact: PathBuf,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl EntryResult {
    pub fn new(entry: &MapEntry, outcome: Outcome) -> Self {
        Self {
            source: entry.source.clone(),
            artifact: entry.artifact.clone(),
            outcome,
        }
    }

    pub fn fail(entry: &MapEntry, reason: FailReason, detail: impl Into<String>) -> Self {
        Self::new(
            entry,
            Outcome::Fail {
                reason,
                detail: detail.into(),
                fix_hint: None,
            },
        )
    }

    pub fn is_fail(&self) -> bool {
        matches!(self.outcome, Outcome::Fail { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_results(results: &[EntryResult]) -> Self {
        let mut summary = Summary {
            total: results.len(),
            ..Summary::default()
        };
        for r in results {
            match r.outcome {
                Outcome::Pass => summary.passed += 1,
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Fail { .. } => summary.failed += 1,
            }
        }
        summary
    }
}

/// Aggregated result of a run, also written as the JSON report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub map_file: String,
    pub modified_only: bool,
    pub entries: Vec<EntryResult>,
    pub summary: Summary,
    /// Informational note, e.g. when nothing was in scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.summary.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryResult> {
        self.entries.iter().filter(|e| e.is_fail())
    }
}

/// Input to the validation pipeline. Everything a run depends on is here;
/// the pipeline never reads the environment or changes directory.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub config: Config,
    /// Root that map paths are relative to and where processes run.
    pub work_dir: PathBuf,
    /// Extra compiler arguments, already split into words.
    pub compile_args: Vec<String>,
    pub modified_only: bool,
    /// Pull request target branch, required with `modified_only`.
    pub base_ref: Option<String>,
    /// Requirements manifest for the compiler toolchain.
    pub requirements: Option<PathBuf>,
    /// Run the package installer on `requirements` before validating.
    pub install: bool,
    /// Stops running processes and the remaining entries when fired.
    pub cancel: CancelToken,
}

impl PipelineInput {
    pub fn new(config: Config, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            work_dir: work_dir.into(),
            compile_args: Vec::new(),
            modified_only: false,
            base_ref: None,
            requirements: None,
            install: false,
            cancel: CancelToken::new(),
        }
    }

    pub fn map_path(&self) -> PathBuf {
        self.work_dir.join(&self.config.map_file)
    }
}

/// Events emitted by the pipeline orchestrator.
#[derive(Debug)]
pub enum PipelineEvent {
    Info(String),
    EntryStarted(MapEntry),
    EntryFinished(EntryResult),
    Completed(RunReport),
    Aborted(PipelineError),
}
