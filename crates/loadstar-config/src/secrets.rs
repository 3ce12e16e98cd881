//! Credential resolution for object storage access.
//!
//! Resolution order for a credential identifier `id`:
//! 1. Environment variables `LOADSTAR_<ID>_ACCESS_KEY_ID` and
//!    `LOADSTAR_<ID>_SECRET_ACCESS_KEY`
//! 2. Config file (`[credentials.<id>]`, with warning)
//!
//! Each half is resolved independently, so an access key in the config file
//! can be paired with a secret from the environment.

use crate::{ConfigError, LoadstarConfig, Result};

/// Prefix for credential environment variables.
const ENV_PREFIX: &str = "LOADSTAR";

/// Resolved access-key / secret-key pair with provenance.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
    /// Where the secret half was found.
    pub source: SecretSource,
}

impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("access_key", &"****")
            .field("secret_key", &"****")
            .field("source", &self.source)
            .finish()
    }
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Environment variable.
    EnvVar(String),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Environment variable names for a credential identifier.
///
/// Returns `(access_key_var, secret_key_var)`.
pub fn credential_env_vars(id: &str) -> (String, String) {
    let normalized: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    (
        format!("{}_{}_ACCESS_KEY_ID", ENV_PREFIX, normalized),
        format!("{}_{}_SECRET_ACCESS_KEY", ENV_PREFIX, normalized),
    )
}

/// Resolve credentials from the process environment and config.
pub fn resolve_credentials(config: &LoadstarConfig, id: &str) -> Result<ResolvedCredentials> {
    resolve_credentials_with(config, id, |var| std::env::var(var).ok())
}

/// Resolve credentials with an explicit environment lookup.
pub fn resolve_credentials_with<F>(
    config: &LoadstarConfig,
    id: &str,
    env: F,
) -> Result<ResolvedCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    let (access_var, secret_var) = credential_env_vars(id);
    let configured = config.credentials.get(id);
    let lookup = |var: &str| env(var).filter(|v| !v.is_empty());

    let access_key = lookup(&access_var)
        .or_else(|| configured.and_then(|c| c.access_key_id.clone()))
        .filter(|v| !v.is_empty());

    let secret = match lookup(&secret_var) {
        Some(value) => Some((value, SecretSource::EnvVar(secret_var.clone()))),
        None => configured
            .and_then(|c| c.secret_access_key.clone())
            .filter(|v| !v.is_empty())
            .map(|value| (value, SecretSource::ConfigFile)),
    };

    match (access_key, secret) {
        (Some(access_key), Some((secret_key, source))) => {
            if source == SecretSource::ConfigFile {
                tracing::warn!(
                    credentials = id,
                    "secret access key read from config file in plaintext"
                );
            }
            Ok(ResolvedCredentials {
                access_key,
                secret_key,
                source,
            })
        }
        _ => Err(ConfigError::CredentialsNotFound {
            id: id.to_string(),
            access_env: access_var,
            secret_env: secret_var,
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
