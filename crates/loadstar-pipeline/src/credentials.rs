//! Credential resolution seam.
//!
//! Tasks that read from object storage look their keys up by an opaque
//! identifier at execution time; they never hold secrets in their own config.

use std::collections::HashMap;

use loadstar_config::{LoadstarConfig, resolve_credentials};

use crate::error::{PipelineError, Result};

/// Access-key / secret-key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &"****")
            .field("secret_key", &"****")
            .finish()
    }
}

/// Resolves a credential identifier to a key pair.
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self, id: &str) -> Result<Credentials>;
}

/// Fixed in-memory credential sets.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    sets: HashMap<String, Credentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a credential set under `id`.
    pub fn with(mut self, id: impl Into<String>, credentials: Credentials) -> Self {
        self.sets.insert(id.into(), credentials);
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn credentials(&self, id: &str) -> Result<Credentials> {
        self.sets
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::Credentials(format!("unknown credentials '{}'", id)))
    }
}

/// Credentials resolved from the environment, then the loaded config.
#[derive(Debug, Clone)]
pub struct ConfigCredentials {
    config: LoadstarConfig,
}

impl ConfigCredentials {
    pub fn new(config: LoadstarConfig) -> Self {
        Self { config }
    }
}

impl CredentialProvider for ConfigCredentials {
    fn credentials(&self, id: &str) -> Result<Credentials> {
        let resolved = resolve_credentials(&self.config, id)
            .map_err(|e| PipelineError::Credentials(e.to_string()))?;
        tracing::debug!(credentials = id, source = %resolved.source, "resolved credentials");
        Ok(Credentials::new(resolved.access_key, resolved.secret_key))
    }
}
