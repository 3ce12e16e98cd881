//! Loadstar - stage, transform and check star-schema warehouse loads
//!
//! Main entry point for the Loadstar CLI.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

mod commands;

use commands::{config, plan, run, validate};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Loadstar - stage, transform and check star-schema warehouse loads
#[derive(Parser)]
#[command(name = "loadstar")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// User config directory (default: platform config dir)
    #[arg(long, global = true, env = "LOADSTAR_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse, validate and build a pipeline file
    Validate(validate::ValidateArgs),

    /// Show execution order, dependencies and defaults
    Plan(plan::PlanArgs),

    /// Run a pipeline for one logical date
    Run(run::RunArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = loadstar_config::load_config_with_options(None, cli.config_dir.as_deref())?;
    let logging = loaded.config.logging();
    let log_dir = logging
        .directory
        .clone()
        .or_else(|| cli.config_dir.as_ref().map(|d| d.join("logs")))
        .or_else(|| loadstar_config::user_config_dir().map(|d| d.join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let _guard = init_tracing(cli.verbose, &logging.level, &log_dir);

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    // Create context for commands
    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config_dir: cli.config_dir,
        loaded,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Validate(args) => validate::run(args, &ctx).await,
        Commands::Plan(args) => plan::run(args, &ctx).await,
        Commands::Run(args) => run::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

/// Console (human-readable, stderr) + daily rolling JSON file.
///
/// The file layer is skipped when the log directory cannot be created.
fn init_tracing(verbose: bool, level: &str, log_dir: &Path) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let filter = if verbose {
        "loadstar=debug,loadstar_pipeline=debug,loadstar_config=debug,info".to_string()
    } else {
        format!("loadstar={level},loadstar_pipeline={level},loadstar_config={level},warn")
    };

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("loadstar.log")
        .build(log_dir);
    let (file_layer, guard) = match appender {
        Ok(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "loadstar=trace,loadstar_pipeline=trace,loadstar_config=trace,info",
                ));
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(file_layer)
        .init();

    guard
}
