//! Checks that compiled pipeline definitions committed to a repository match
//! what the compiler produces from their sources today.

pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod mapping;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod scope;
