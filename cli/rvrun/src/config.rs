//! `rvrun.toml` configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Settings for the `run` subcommand.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Environment variables handed to the guest, as KEY=VALUE strings.
    #[serde(default)]
    pub env: Vec<String>,
    /// Fail on syscalls outside the implemented set.
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
}

/// Load configuration. An explicit path must exist; the default
/// `rvrun.toml` is optional.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (Path::new("rvrun.toml").to_path_buf(), false),
    };
    if !path.exists() {
        if required {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
