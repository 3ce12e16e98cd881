//! Plan command - show what a run would execute, in order.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::{Context, load_pipeline};

/// Arguments for the plan command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Pipeline file (default: built-in sparkify pipeline)
    pub file: Option<PathBuf>,
}

/// Run the plan command.
pub async fn run(args: PlanArgs, ctx: &Context) -> Result<()> {
    let pipeline = load_pipeline(args.file.as_deref(), ctx)?;
    let defaults = pipeline.defaults();

    if ctx.json_output {
        let tasks: Vec<_> = pipeline
            .execution_order()
            .map(|t| {
                serde_json::json!({
                    "id": t.id(),
                    "kind": t.operator().kind(),
                    "dependencies": t.dependencies(),
                })
            })
            .collect();
        let out = serde_json::json!({
            "name": pipeline.name(),
            "description": pipeline.description(),
            "defaults": defaults,
            "tasks": tasks,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Pipeline: {}", pipeline.name());
    if !pipeline.description().is_empty() {
        println!("  {}", pipeline.description());
    }
    println!();

    println!("Execution order:");
    for (i, task) in pipeline.execution_order().enumerate() {
        let deps = if task.dependencies().is_empty() {
            String::new()
        } else {
            format!("  <- {}", task.dependencies().join(", "))
        };
        println!(
            "  {:>2}. {:<28} {:<10}{}",
            i + 1,
            task.id(),
            task.operator().kind().to_string(),
            deps
        );
    }
    println!();

    println!("Defaults:");
    println!("  owner:            {}", defaults.owner);
    println!("  start_date:       {}", defaults.start_date.to_rfc3339());
    println!("  schedule:         {}", defaults.schedule);
    println!("  retries:          {}", defaults.retries);
    println!("  retry_delay:      {}s", defaults.retry_delay().as_secs());
    println!("  depends_on_past:  {}", defaults.depends_on_past);
    println!("  email_on_retry:   {}", defaults.email_on_retry);
    println!("  catchup:          {}", defaults.catchup);

    Ok(())
}
