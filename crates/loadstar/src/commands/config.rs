//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use loadstar_config::{LoadstarConfig, SecretSource, credential_env_vars, resolve_credentials};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./loadstar.toml) instead of user config
        #[arg(long)]
        local: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx).await,
        ConfigCommand::Path => cmd_path(ctx).await,
        ConfigCommand::Init { local } => cmd_init(local, ctx).await,
    }
}

fn user_config_path(ctx: &Context) -> Option<PathBuf> {
    match ctx.config_dir {
        Some(ref dir) => Some(dir.join("config.toml")),
        None => loadstar_config::user_config_path(),
    }
}

/// Copy of `config` with both halves of every credential set masked.
fn redacted(config: &LoadstarConfig) -> LoadstarConfig {
    let mut config = config.clone();
    for creds in config.credentials.values_mut() {
        for value in [&mut creds.access_key_id, &mut creds.secret_access_key] {
            if value.is_some() {
                *value = Some("****".to_string());
            }
        }
    }
    config
}

async fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = &ctx.loaded;
    let config = &loaded.config;

    if ctx.json_output {
        let sources: Vec<_> = loaded
            .sources
            .iter()
            .map(|s| serde_json::json!({ "path": s.path, "loaded": s.loaded }))
            .collect();
        let out = serde_json::json!({
            "sources": sources,
            "config": redacted(config),
            "effective_defaults": config.defaults(),
            "warnings": loaded.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("# Loadstar Configuration\n");

    // Sources
    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    // Defaults
    let defaults = config.defaults();
    println!("Defaults:");
    println!("  owner: {}", defaults.owner);
    println!("  start_date: {}", defaults.start_date.to_rfc3339());
    println!("  schedule: {}", defaults.schedule);
    println!(
        "  retries: {} (delay {}s)",
        defaults.retries, defaults.retry_delay_secs
    );
    println!();

    // Warehouse / storage
    let warehouse = config.warehouse();
    println!("Warehouse:");
    println!("  connection_id: {}", warehouse.connection_id);
    println!();

    let storage = config.storage();
    if storage.bucket.is_some() || storage.region.is_some() {
        println!("Storage:");
        if let Some(ref bucket) = storage.bucket {
            println!("  bucket: {}", bucket);
        }
        if let Some(ref region) = storage.region {
            println!("  region: {}", region);
        }
        println!();
    }

    // Credentials
    if !config.credentials.is_empty() {
        println!("Credentials:");
        let mut ids: Vec<&String> = config.credentials.keys().collect();
        ids.sort();
        for id in ids {
            let status = match resolve_credentials(config, id) {
                Ok(resolved) => match resolved.source {
                    SecretSource::EnvVar(var) => format!("✓ from {}", var),
                    SecretSource::ConfigFile => "⚠ from config file (plaintext)".to_string(),
                },
                Err(_) => {
                    let (access, secret) = credential_env_vars(id);
                    format!("✗ missing (set {} and {})", access, secret)
                }
            };
            println!("  {:<20} {}", id, status);
        }
        println!();
    }

    // Warnings
    if !loaded.warnings.is_empty() {
        println!("Warnings:");
        for w in &loaded.warnings {
            println!("  ⚠ {}", w);
        }
        println!();
    }

    if ctx.verbose {
        // Show raw TOML
        println!("---\nRaw config:\n");
        if let Ok(toml_str) = redacted(config).to_toml() {
            println!("{}", toml_str);
        }
    }

    Ok(())
}

async fn cmd_path(ctx: &Context) -> Result<()> {
    if let Some(path) = user_config_path(ctx) {
        println!("{}", path.display());
    } else {
        eprintln!("Could not determine config directory");
    }
    Ok(())
}

const CONFIG_TEMPLATE: &str = r#"# Loadstar Configuration

# Scheduler defaults carried by every pipeline
[defaults]
owner = "sparkify"
start_date = "2019-01-12T00:00:00Z"
depends_on_past = false
retries = 3
retry_delay_secs = 300
email_on_retry = false
schedule = "0 * * * *"
catchup = false

[warehouse]
connection_id = "redshift"

[storage]
bucket = "udacity-dend"
# region = "us-west-2"

# Credentials are read from LOADSTAR_<ID>_ACCESS_KEY_ID and
# LOADSTAR_<ID>_SECRET_ACCESS_KEY. Plaintext values here are supported
# but warned about.
# [credentials.aws_credentials]
# access_key_id = "..."
# secret_access_key = "..."

[logging]
level = "info"
"#;

async fn cmd_init(local: bool, ctx: &Context) -> Result<()> {
    let path = if local {
        loadstar_config::project_config_path(&std::env::current_dir()?)
    } else {
        let path = user_config_path(ctx)
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        path
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    std::fs::write(&path, CONFIG_TEMPLATE)?;
    println!("✓ Created config file: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  export LOADSTAR_AWS_CREDENTIALS_ACCESS_KEY_ID=...      # bucket credentials");
    println!("  export LOADSTAR_AWS_CREDENTIALS_SECRET_ACCESS_KEY=...");
    println!("  loadstar config show                                   # verify configuration");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses() {
        let config = LoadstarConfig::from_toml(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.defaults(), loadstar_config::DefaultArgs::default());
        assert_eq!(config.storage().bucket.as_deref(), Some("udacity-dend"));
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let config = LoadstarConfig::from_toml(
            "[credentials.aws]\naccess_key_id = \"AKIDEXAMPLE\"\nsecret_access_key = \"TOPSECRET\"\n",
        )
        .unwrap();
        let shown = redacted(&config).to_toml().unwrap();
        assert!(!shown.contains("TOPSECRET"));
        assert!(!shown.contains("AKIDEXAMPLE"));
        assert!(shown.contains("access_key_id = \"****\""));
    }
}
