use std::path::Path;

use anyhow::{Context, Result, bail};

use super::types::{Config, OUTPUT_PLACEHOLDER, SOURCE_PLACEHOLDER};

pub const CONFIG_FILE_NAME: &str = ".kfpcheck";

/// Load config from a `.kfpcheck` file in the given directory, falling back
/// to defaults when the file does not exist.
pub fn load(dir: &Path) -> Result<Config> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    validate(&config).with_context(|| format!("invalid config in {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.compiler.is_empty() {
        bail!("`compiler` must name a program");
    }
    for placeholder in [SOURCE_PLACEHOLDER, OUTPUT_PLACEHOLDER] {
        if !config.compiler.iter().any(|arg| arg.contains(placeholder)) {
            bail!("`compiler` must contain the {placeholder} placeholder");
        }
    }
    if config.installer.is_empty() {
        bail!("`installer` must name a program");
    }
    Ok(())
}
