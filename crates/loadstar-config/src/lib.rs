//! Configuration system for loadstar.
//!
//! Provides TOML-based configuration with:
//! - The scheduler defaults record (`[defaults]`) carried by every pipeline
//! - Warehouse and object storage settings (`[warehouse]`, `[storage]`)
//! - Named credential sets (`[credentials.<id>]`)
//! - Config file layering (user config + project-local overrides)
//! - Credential resolution (env var → config file)

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    project_config_path, save_config, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{
    ResolvedCredentials, SecretSource, credential_env_vars, resolve_credentials,
    resolve_credentials_with,
};
pub use types::*;
