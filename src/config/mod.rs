//! `.kfpcheck` settings: compiler and installer templates, timeout, jobs.

mod loader;
mod types;

pub use loader::{CONFIG_FILE_NAME, load};
pub use types::{
    Config, DEFAULT_MAP_FILE, Jobs, OUTPUT_PLACEHOLDER, REQUIREMENTS_PLACEHOLDER,
    SOURCE_PLACEHOLDER,
};
