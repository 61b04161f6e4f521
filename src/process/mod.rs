//! External process execution: spawn, capture output, enforce timeouts and
//! cancellation.

pub mod run;
pub mod types;

pub use run::run;
pub use types::{CancelToken, ProcessCommand, ProcessOutput};
