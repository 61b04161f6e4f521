//! Validation run: compile every in-scope entry and compare it with the
//! checked-in artifact.

pub mod commands;
pub mod compile;
pub mod orchestrator;
mod types;

pub use compile::CompiledArtifact;
pub use orchestrator::{NOTHING_TO_VALIDATE, run_pipeline, validate};
pub use types::{
    EntryResult, FailReason, Outcome, PipelineEvent, PipelineInput, RunReport, Summary,
};
