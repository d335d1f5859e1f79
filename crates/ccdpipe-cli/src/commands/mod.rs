pub mod align;
pub mod combine;
pub mod config;
pub mod info;
pub mod log;
pub mod reduce;

use std::path::Path;

use anyhow::{Context, Result};
use ccdpipe_core::pipeline::config::PipelineConfig;

/// Load a TOML config, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&contents).context("Invalid pipeline config")
}
