//! Pipeline map loading: the JSON `source -> artifact` file that drives a run.

mod loader;
mod types;

pub use loader::{load_mapping, parse_mapping};
pub use types::{MapEntry, PipelineMap};
