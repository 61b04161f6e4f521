use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use kfpcheck::cli::Cli;
use kfpcheck::error::PipelineError;
use kfpcheck::pipeline::{PipelineEvent, run_pipeline};
use kfpcheck::report;
use kfpcheck::scope::GitCli;

/// Conventional status for a run stopped by SIGINT or SIGTERM.
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let work_dir = match &cli.work_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    let config = kfpcheck::config::load(&work_dir)?;
    let report_path: Option<PathBuf> = cli.report.clone();
    let input = cli.into_input(config, work_dir.clone())?;

    // Signals only flag the run; the pipeline kills its children and removes
    // temporary output before reporting back.
    let cancel = input.cancel.clone();
    ctrlc::set_handler(move || cancel.cancel()).context("failed to install signal handler")?;

    let git = GitCli::new(&work_dir, input.config.process_timeout())
        .with_cancel(input.cancel.clone());
    let events = run_pipeline(input, Box::new(git));

    for event in events {
        match event {
            PipelineEvent::Info(msg) => println!("ℹ️  {msg}"),
            PipelineEvent::EntryStarted(entry) => println!("{}", report::checking_line(&entry)),
            PipelineEvent::EntryFinished(result) => println!("{}", report::entry_line(&result)),
            PipelineEvent::Completed(run) => {
                let failures = report::render_failures(&run);
                if !failures.is_empty() {
                    eprintln!();
                    eprint!("{failures}");
                }
                if let Some(path) = &report_path {
                    report::write_json(&run, path)?;
                }
                println!("{}", report::summary_line(&run));
                return Ok(if run.success() {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                });
            }
            PipelineEvent::Aborted(e @ PipelineError::Cancelled) => {
                eprintln!("❌ {e}");
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            }
            PipelineEvent::Aborted(e) => {
                eprintln!("❌ {e}");
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    anyhow::bail!("validation stopped without a result")
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("KFPCHECK_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
