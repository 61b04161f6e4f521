use std::path::Path;

use crate::config::{Config, OUTPUT_PLACEHOLDER, REQUIREMENTS_PLACEHOLDER, SOURCE_PLACEHOLDER};
use crate::mapping::MapEntry;
use crate::process::ProcessCommand;

/// Build the compiler invocation for one source file.
///
/// `{source}` and `{output}` in the configured template are substituted and
/// `extra_args` are appended verbatim.
pub fn compile_command(
    cfg: &Config,
    work_dir: &Path,
    source: &Path,
    output: &Path,
    extra_args: &[String],
) -> ProcessCommand {
    let source = source.to_string_lossy();
    let output = output.to_string_lossy();

    let mut words = cfg.compiler.iter().map(|word| {
        word.replace(SOURCE_PLACEHOLDER, &source)
            .replace(OUTPUT_PLACEHOLDER, &output)
    });
    let program = words.next().unwrap_or_default();
    let mut args: Vec<String> = words.collect();
    args.extend(extra_args.iter().cloned());

    ProcessCommand {
        program,
        args,
        cwd: work_dir.to_path_buf(),
        timeout: cfg.process_timeout(),
    }
}

/// Build the package installer invocation for a requirements manifest.
pub fn install_command(cfg: &Config, work_dir: &Path, requirements: &Path) -> ProcessCommand {
    let requirements = requirements.to_string_lossy();
    let mut words = cfg
        .installer
        .iter()
        .map(|word| word.replace(REQUIREMENTS_PLACEHOLDER, &requirements));
    let program = words.next().unwrap_or_default();

    ProcessCommand {
        program,
        args: words.collect(),
        cwd: work_dir.to_path_buf(),
        timeout: cfg.process_timeout(),
    }
}

/// The command a developer runs to regenerate `entry`'s artifact in place.
pub fn fix_command(
    cfg: &Config,
    work_dir: &Path,
    entry: &MapEntry,
    extra_args: &[String],
) -> String {
    compile_command(cfg, work_dir, &entry.source, &entry.artifact, extra_args).display_line()
}
