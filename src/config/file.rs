//! Configuration file loading

use super::Config;
use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from `path`, or built-in defaults when none is given
pub fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_from_path(path),
        None => {
            let config = Config::default();
            super::validate(&config)?;
            Ok(config)
        },
    }
}

/// Load and parse config from path
pub fn load_from_path(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    super::validate(&config)?;

    Ok(config)
}
