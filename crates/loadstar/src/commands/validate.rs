//! Validate command - check a pipeline file builds.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::{Context, load_pipeline};

/// Arguments for the validate command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Pipeline file (default: built-in sparkify pipeline)
    pub file: Option<PathBuf>,
}

/// Run the validate command.
pub async fn run(args: ValidateArgs, ctx: &Context) -> Result<()> {
    let pipeline = load_pipeline(args.file.as_deref(), ctx)?;

    if ctx.json_output {
        let out = serde_json::json!({
            "valid": true,
            "name": pipeline.name(),
            "tasks": pipeline.len(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "✓ Pipeline '{}' is valid ({} tasks)",
            pipeline.name(),
            pipeline.len()
        );
    }

    Ok(())
}
