//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to write a config file.
    #[error("failed to write config file '{path}': {source}")]
    WriteFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize config.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No credentials could be resolved for an identifier.
    #[error(
        "credentials '{id}' not found. Set {access_env} and {secret_env}, or add a [credentials.{id}] section"
    )]
    CredentialsNotFound {
        id: String,
        access_env: String,
        secret_env: String,
    },

    /// A config value failed validation.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
