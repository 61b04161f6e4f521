use std::sync::mpsc::{self, Receiver, Sender};

use crate::diff::{DiffOutcome, compare_artifacts};
use crate::error::{InstallError, PipelineError, ValidationError};
use crate::mapping::{MapEntry, load_mapping};
use crate::scope::{ChangeSource, ScopeFilter, resolve_scope};

use super::commands::fix_command;
use super::compile::{compile, install};
use super::types::{
    EntryResult, FailReason, Outcome, PipelineEvent, PipelineInput, RunReport, Summary,
};

pub const NOTHING_TO_VALIDATE: &str =
    "No modified files match the pipeline map; nothing to validate.";

/// Launch the validation pipeline on a background thread.
///
/// Returns a receiver that streams `PipelineEvent` values. The final event
/// is always either `Completed` or `Aborted`.
pub fn run_pipeline(
    input: PipelineInput,
    changes: Box<dyn ChangeSource>,
) -> Receiver<PipelineEvent> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let event = match validate(&input, changes.as_ref(), &tx) {
            Ok(report) => PipelineEvent::Completed(report),
            Err(e) => PipelineEvent::Aborted(e),
        };
        let _ = tx.send(event);
    });
    rx
}

/// Run the whole pipeline on the calling thread.
///
/// Fatal problems (map, scope, install) return `Err` before any entry is
/// compiled. Per-entry problems never abort; they become `FAIL` results.
/// Firing `input.cancel` stops the run with `PipelineError::Cancelled` once
/// running processes are killed and their temporary output is removed.
pub fn validate(
    input: &PipelineInput,
    changes: &dyn ChangeSource,
    tx: &Sender<PipelineEvent>,
) -> Result<RunReport, PipelineError> {
    let cfg = &input.config;

    if let Some(requirements) = &input.requirements {
        if !input.work_dir.join(requirements).is_file() {
            return Err(InstallError::RequirementsMissing(requirements.clone()).into());
        }
        if input.install {
            install(cfg, &input.work_dir, requirements, &input.cancel)
                .map_err(|e| interrupted(input, e.into()))?;
        }
    }

    // ── Load map ─────────────────────────────────────────────────────
    let map = load_mapping(&input.map_path())?;

    // ── Resolve scope ────────────────────────────────────────────────
    let scope = resolve_scope(input.modified_only, input.base_ref.as_deref(), changes)
        .map_err(|e| interrupted(input, e.into()))?;
    let in_scope = map.entries().iter().filter(|e| scope.includes(e)).count();

    let mut report = RunReport {
        map_file: cfg.map_file.display().to_string(),
        modified_only: scope.is_restricted(),
        ..RunReport::default()
    };

    if scope.is_restricted() && in_scope > 0 {
        let noun = if in_scope == 1 { "entry" } else { "entries" };
        let msg = format!("Validating {in_scope} pipeline map {noun} (modified only).");
        let _ = tx.send(PipelineEvent::Info(msg.clone()));
        report.message = Some(msg);
    }

    // ── Process entries ──────────────────────────────────────────────
    report.entries = check_entries(map.entries(), &scope, input, tx);
    if input.cancel.is_cancelled() {
        tracing::warn!("validation cancelled");
        return Err(PipelineError::Cancelled);
    }

    if in_scope == 0 {
        // Only reachable with a change filter: the map itself is never empty.
        tracing::info!("no mapped files in change set");
        let _ = tx.send(PipelineEvent::Info(NOTHING_TO_VALIDATE.to_string()));
        report.message = Some(NOTHING_TO_VALIDATE.to_string());
    }

    // ── Aggregate ────────────────────────────────────────────────────
    report.summary = Summary::from_results(&report.entries);
    tracing::info!(
        passed = report.summary.passed,
        failed = report.summary.failed,
        skipped = report.summary.skipped,
        "validation finished"
    );
    Ok(report)
}

/// A failure caused by cancellation is reported as the cancellation itself.
fn interrupted(input: &PipelineInput, err: PipelineError) -> PipelineError {
    if input.cancel.is_cancelled() {
        PipelineError::Cancelled
    } else {
        err
    }
}

/// Check in-scope entries in chunks of `jobs` and finish every entry,
/// skipped ones included, in map order.
fn check_entries(
    entries: &[MapEntry],
    scope: &ScopeFilter,
    input: &PipelineInput,
    tx: &Sender<PipelineEvent>,
) -> Vec<EntryResult> {
    let jobs = input.config.jobs.resolve().max(1);
    let in_scope: Vec<usize> = (0..entries.len())
        .filter(|&idx| scope.includes(&entries[idx]))
        .collect();

    let mut results: Vec<EntryResult> = Vec::with_capacity(entries.len());
    let finish = |result: EntryResult, results: &mut Vec<EntryResult>| {
        let _ = tx.send(PipelineEvent::EntryFinished(result.clone()));
        results.push(result);
    };
    // `results.len()` is always the next map position to report.
    let skip_until = |upto: usize, results: &mut Vec<EntryResult>| {
        while results.len() < upto {
            finish(
                EntryResult::new(&entries[results.len()], Outcome::Skipped),
                results,
            );
        }
    };

    for chunk in in_scope.chunks(jobs) {
        if input.cancel.is_cancelled() {
            return results;
        }
        skip_until(chunk[0], &mut results);
        let checked = check_chunk(chunk, entries, input, tx);
        for (&idx, result) in chunk.iter().zip(checked) {
            skip_until(idx, &mut results);
            finish(result, &mut results);
        }
    }
    skip_until(entries.len(), &mut results);
    results
}

fn check_chunk(
    chunk: &[usize],
    entries: &[MapEntry],
    input: &PipelineInput,
    tx: &Sender<PipelineEvent>,
) -> Vec<EntryResult> {
    if let [idx] = chunk {
        return vec![check_entry(&entries[*idx], input, tx)];
    }

    std::thread::scope(|s| {
        let handles: Vec<_> = chunk
            .iter()
            .map(|&idx| {
                let entry = &entries[idx];
                let tx = tx.clone();
                (entry, s.spawn(move || check_entry(entry, input, &tx)))
            })
            .collect();

        handles
            .into_iter()
            .map(|(entry, handle)| {
                handle.join().unwrap_or_else(|_| {
                    EntryResult::fail(entry, FailReason::Io, "validation worker panicked")
                })
            })
            .collect()
    })
}

/// Validate one entry. The compiled output is dropped, and its temporary
/// directory removed, before this returns.
fn check_entry(
    entry: &MapEntry,
    input: &PipelineInput,
    tx: &Sender<PipelineEvent>,
) -> EntryResult {
    let _ = tx.send(PipelineEvent::EntryStarted(entry.clone()));
    check_entry_inner(entry, input)
}

fn check_entry_inner(entry: &MapEntry, input: &PipelineInput) -> EntryResult {
    let span = tracing::info_span!("entry", source = %entry.source.display());
    let _guard = span.enter();

    let source = input.work_dir.join(&entry.source);
    let artifact = input.work_dir.join(&entry.artifact);

    if !source.is_file() {
        return EntryResult::fail(
            entry,
            FailReason::SourceMissing,
            format!("Source file not found: {}", entry.source.display()),
        );
    }
    if !artifact.is_file() {
        return EntryResult::fail(
            entry,
            FailReason::ArtifactMissing,
            ValidationError::ArtifactMissing(entry.artifact.clone()).to_string(),
        );
    }

    let compiled = match compile(
        &input.config,
        &input.work_dir,
        &entry.source,
        entry.artifact.file_name(),
        &input.compile_args,
        &input.cancel,
    ) {
        Ok(compiled) => compiled,
        Err(e) => {
            tracing::warn!(error = %e, "compile failed");
            return EntryResult::fail(entry, FailReason::CompileFailed, e.to_string());
        }
    };

    match compare_artifacts(compiled.path(), &artifact) {
        Ok(DiffOutcome::Identical) => EntryResult::new(entry, Outcome::Pass),
        Ok(DiffOutcome::Mismatch(mut diff)) => {
            diff.expected_label = entry.artifact.display().to_string();
            EntryResult::new(
                entry,
                Outcome::Fail {
                    reason: FailReason::OutOfDate,
                    detail: diff.render(),
                    fix_hint: Some(fix_command(
                        &input.config,
                        &input.work_dir,
                        entry,
                        &input.compile_args,
                    )),
                },
            )
        }
        Err(e @ ValidationError::ArtifactMissing(_)) => {
            EntryResult::fail(entry, FailReason::ArtifactMissing, e.to_string())
        }
        Err(e) => EntryResult::fail(entry, FailReason::Io, e.to_string()),
    }
}
