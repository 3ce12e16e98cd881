//! CLI command handlers.

use std::path::{Path, PathBuf};

use anyhow::Result;
use loadstar_config::LoadedConfig;
use loadstar_pipeline::{Pipeline, PipelineFile, sparkify_pipeline_with};

pub mod config;
pub mod plan;
pub mod run;
pub mod validate;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// User config directory override.
    pub config_dir: Option<PathBuf>,
    /// Merged configuration layers.
    pub loaded: LoadedConfig,
}

/// Build the pipeline in `file`, or the built-in sparkify pipeline.
pub fn load_pipeline(file: Option<&Path>, ctx: &Context) -> Result<Pipeline> {
    let config = &ctx.loaded.config;
    let pipeline = match file {
        Some(path) => PipelineFile::from_file(path)?.pipeline.build(config)?,
        None => sparkify_pipeline_with(config)?,
    };
    Ok(pipeline)
}
