use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::{Config, Jobs};
use crate::pipeline::PipelineInput;
use crate::process::CancelToken;

/// Verify that compiled pipeline definitions are in sync with their sources.
#[derive(Debug, Parser)]
#[command(name = "kfpcheck", version, about)]
pub struct Cli {
    /// Path to JSON mapping file (source -> compiled artifact)
    #[arg(long)]
    pub map_file: Option<PathBuf>,

    /// Requirements manifest for the compiler toolchain
    #[arg(long)]
    pub requirements: PathBuf,

    /// Install the requirements with the configured installer first
    #[arg(long)]
    pub install: bool,

    /// Extra arguments to pass to the compiler
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub compile_args: String,

    /// Only validate entries whose files changed against the base branch
    #[arg(long)]
    pub modified_only: bool,

    /// Base branch for --modified-only
    #[arg(long, env = "GITHUB_BASE_REF")]
    pub base_ref: Option<String>,

    /// Entries validated concurrently: "auto" or a positive integer
    #[arg(long)]
    pub jobs: Option<Jobs>,

    /// Write a JSON report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Directory the map paths are relative to (defaults to the current directory)
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Merge flags over file config into a pipeline input.
    pub fn into_input(self, mut config: Config, work_dir: PathBuf) -> Result<PipelineInput> {
        if let Some(map_file) = self.map_file {
            config.map_file = map_file;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }

        let compile_args = shell_words::split(&self.compile_args)
            .with_context(|| format!("invalid --compile-args: {:?}", self.compile_args))?;

        Ok(PipelineInput {
            config,
            work_dir,
            compile_args,
            modified_only: self.modified_only,
            base_ref: self.base_ref,
            requirements: Some(self.requirements),
            install: self.install,
            cancel: CancelToken::new(),
        })
    }
}
