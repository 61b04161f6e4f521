use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::Config;
use crate::error::{CompileError, InstallError};
use crate::process::{self, CancelToken};

use super::commands::{compile_command, install_command};

const DEFAULT_OUTPUT_NAME: &str = "compiled.yaml";

/// Freshly compiled output in a private temporary directory.
///
/// The directory is removed when this value is dropped, whichever way the
/// entry finishes.
#[derive(Debug)]
pub struct CompiledArtifact {
    dir: TempDir,
    path: PathBuf,
}

impl CompiledArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Compile `source` (relative to `work_dir`) into a new temporary directory.
///
/// The output keeps `output_name` as its file name so compilers that pick a
/// format by extension behave as they would for the checked-in artifact.
pub fn compile(
    cfg: &Config,
    work_dir: &Path,
    source: &Path,
    output_name: Option<&OsStr>,
    extra_args: &[String],
    cancel: &CancelToken,
) -> Result<CompiledArtifact, CompileError> {
    if !work_dir.join(source).is_file() {
        return Err(CompileError::SourceMissing(source.to_path_buf()));
    }

    let dir = tempfile::Builder::new()
        .prefix("kfpcheck-")
        .tempdir()
        .map_err(CompileError::TempDir)?;
    let path = dir
        .path()
        .join(output_name.unwrap_or(OsStr::new(DEFAULT_OUTPUT_NAME)));

    let cmd = compile_command(cfg, work_dir, source, &path, extra_args);
    let out = process::run(&cmd, cancel).map_err(|e| CompileError::Spawn {
        program: cmd.program.clone(),
        message: spawn_message(&e),
    })?;

    if out.cancelled {
        return Err(CompileError::Cancelled(source.to_path_buf()));
    }
    if out.timed_out {
        return Err(CompileError::TimedOut(source.to_path_buf()));
    }
    if !out.success {
        return Err(CompileError::Failed {
            source_path: source.to_path_buf(),
            exit_code: out.exit_code,
            stderr: out.stderr,
        });
    }
    if !path.is_file() {
        return Err(CompileError::NoOutput(source.to_path_buf()));
    }

    tracing::debug!(source = %source.display(), output = %path.display(), "compiled");
    Ok(CompiledArtifact { dir, path })
}

/// Install the compiler toolchain's dependencies from `requirements`.
pub fn install(
    cfg: &Config,
    work_dir: &Path,
    requirements: &Path,
    cancel: &CancelToken,
) -> Result<(), InstallError> {
    if !work_dir.join(requirements).is_file() {
        return Err(InstallError::RequirementsMissing(requirements.to_path_buf()));
    }

    let cmd = install_command(cfg, work_dir, requirements);
    tracing::info!(command = %cmd, "installing compiler dependencies");
    let out = process::run(&cmd, cancel).map_err(|e| InstallError::Spawn {
        program: cmd.program.clone(),
        message: spawn_message(&e),
    })?;

    if out.cancelled {
        return Err(InstallError::Cancelled);
    }
    if out.timed_out {
        return Err(InstallError::TimedOut);
    }
    if !out.success {
        return Err(InstallError::Failed {
            exit_code: out.exit_code,
            stderr: out.stderr,
        });
    }
    Ok(())
}

fn spawn_message(err: &std::io::Error) -> String {
    if err.kind() == ErrorKind::NotFound {
        "not installed or not on PATH".to_string()
    } else {
        err.to_string()
    }
}
