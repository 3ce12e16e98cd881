//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [defaults]               # scheduler defaults record
//! [warehouse]              # warehouse connection settings
//! [storage]                # object storage (source bucket, region)
//! [credentials.aws]        # named credential sets
//! [logging]                # log level and file directory
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadstarConfig {
    /// Scheduler defaults applied to every pipeline.
    pub defaults: Option<DefaultArgs>,

    /// Warehouse connection settings.
    pub warehouse: Option<WarehouseConfig>,

    /// Object storage settings.
    pub storage: Option<StorageConfig>,

    /// Named credential sets, keyed by credential identifier.
    pub credentials: HashMap<String, CredentialConfig>,

    /// Logging configuration.
    pub logging: Option<LoggingConfig>,
}

impl LoadstarConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: LoadstarConfig = toml::from_str(toml_str)?;
        if let Some(ref defaults) = config.defaults {
            defaults.validate()?;
        }
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced wholesale; credential sets are merged by id.
    pub fn merge(&mut self, other: LoadstarConfig) {
        if other.defaults.is_some() {
            self.defaults = other.defaults;
        }

        if other.warehouse.is_some() {
            self.warehouse = other.warehouse;
        }

        if other.storage.is_some() {
            self.storage = other.storage;
        }

        for (id, creds) in other.credentials {
            self.credentials.insert(id, creds);
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Effective scheduler defaults (configured or built-in).
    pub fn defaults(&self) -> DefaultArgs {
        self.defaults.clone().unwrap_or_default()
    }

    /// Effective warehouse settings.
    pub fn warehouse(&self) -> WarehouseConfig {
        self.warehouse.clone().unwrap_or_default()
    }

    /// Effective object storage settings.
    pub fn storage(&self) -> StorageConfig {
        self.storage.clone().unwrap_or_default()
    }

    /// Effective logging settings.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Ids of credential sets that carry a plaintext secret.
    pub fn plaintext_credentials(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .credentials
            .iter()
            .filter(|(_, c)| c.secret_access_key.is_some())
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scheduler defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Defaults handed to the external scheduler for every task of a pipeline.
///
/// Only the options listed here are recognized; unknown keys are rejected.
/// Loadstar itself never retries or schedules anything, it only carries
/// these values.
///
/// ```toml
/// [defaults]
/// owner = "sparkify"
/// start_date = "2019-01-12T00:00:00Z"
/// depends_on_past = false
/// retries = 3
/// retry_delay_secs = 300
/// email_on_retry = false
/// schedule = "0 * * * *"
/// catchup = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultArgs {
    /// Owner recorded on every task.
    pub owner: String,
    /// First logical date the pipeline is scheduled for.
    pub start_date: DateTime<Utc>,
    /// Whether a run waits for the previous run of the same task.
    pub depends_on_past: bool,
    /// Retry count on task failure.
    pub retries: u32,
    /// Delay between retries in seconds.
    pub retry_delay_secs: u64,
    /// Whether the scheduler emails on retry.
    pub email_on_retry: bool,
    /// Cron expression or `@preset`.
    pub schedule: String,
    /// Whether missed intervals are backfilled.
    pub catchup: bool,
}

/// 2019-01-12T00:00:00Z
const DEFAULT_START_TIMESTAMP: i64 = 1_547_251_200;

impl Default for DefaultArgs {
    fn default() -> Self {
        Self {
            owner: "sparkify".to_string(),
            start_date: DateTime::<Utc>::from_timestamp(DEFAULT_START_TIMESTAMP, 0)
                .unwrap_or_default(),
            depends_on_past: false,
            retries: 3,
            retry_delay_secs: 300,
            email_on_retry: false,
            schedule: "0 * * * *".to_string(),
            catchup: false,
        }
    }
}

const SCHEDULE_PRESETS: &[&str] = &[
    "@once", "@hourly", "@daily", "@weekly", "@monthly", "@yearly",
];

impl DefaultArgs {
    /// Retry delay as a `Duration`.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Check field values the type system cannot.
    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "defaults.owner".to_string(),
                reason: "owner cannot be empty".to_string(),
            });
        }

        let schedule = self.schedule.trim();
        let is_preset = SCHEDULE_PRESETS.contains(&schedule);
        if !is_preset && schedule.split_whitespace().count() != 5 {
            return Err(ConfigError::InvalidValue {
                field: "defaults.schedule".to_string(),
                reason: format!(
                    "'{}' is neither a 5-field cron expression nor one of {}",
                    self.schedule,
                    SCHEDULE_PRESETS.join(", ")
                ),
            });
        }

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Warehouse / storage
// ─────────────────────────────────────────────────────────────────────────────

/// Warehouse connection settings.
///
/// The connection itself is owned by whoever executes tasks; this only names it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarehouseConfig {
    /// Connection identifier resolved by the executing environment.
    pub connection_id: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            connection_id: "redshift".to_string(),
        }
    }
}

/// Object storage settings for raw source files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Default source bucket.
    pub bucket: Option<String>,
    /// Region of the bucket, emitted as a `REGION` clause when set.
    pub region: Option<String>,
}

/// A credential set in the config file.
///
/// Storing the secret here is supported but warned about; prefer env vars.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |value: &Option<String>| value.as_ref().map(|_| "****");
        f.debug_struct("CredentialConfig")
            .field("access_key_id", &mask(&self.access_key_id))
            .field("secret_access_key", &mask(&self.secret_access_key))
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console log level (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
    /// Directory for the rolling JSON log file.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_parses() {
        let config = LoadstarConfig::from_toml("").unwrap();
        assert!(config.defaults.is_none());
        assert!(config.credentials.is_empty());
        assert_eq!(config.defaults(), DefaultArgs::default());
    }

    #[test]
    fn test_default_args_match_sparkify_schedule() {
        let d = DefaultArgs::default();
        assert_eq!(d.owner, "sparkify");
        assert_eq!(d.start_date.to_rfc3339(), "2019-01-12T00:00:00+00:00");
        assert_eq!(d.retries, 3);
        assert_eq!(d.retry_delay(), Duration::from_secs(300));
        assert_eq!(d.schedule, "0 * * * *");
        assert!(!d.depends_on_past);
        assert!(!d.email_on_retry);
        assert!(!d.catchup);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[defaults]
owner = "data-eng"
start_date = "2020-03-01T00:00:00Z"
retries = 1
retry_delay_secs = 60
schedule = "@daily"

[warehouse]
connection_id = "dwh"

[storage]
bucket = "udacity-dend"
region = "us-west-2"

[credentials.aws_credentials]
access_key_id = "AK"

[logging]
level = "debug"
directory = "/var/log/loadstar"
"#;
        let config = LoadstarConfig::from_toml(toml).unwrap();
        let defaults = config.defaults();
        assert_eq!(defaults.owner, "data-eng");
        assert_eq!(defaults.retries, 1);
        assert_eq!(defaults.schedule, "@daily");
        // unspecified fields fall back to built-in defaults
        assert!(!defaults.catchup);

        assert_eq!(config.warehouse().connection_id, "dwh");
        let storage = config.storage.unwrap();
        assert_eq!(storage.bucket.as_deref(), Some("udacity-dend"));
        assert_eq!(storage.region.as_deref(), Some("us-west-2"));
        assert_eq!(
            config.credentials["aws_credentials"].access_key_id.as_deref(),
            Some("AK")
        );
        assert_eq!(config.logging.unwrap().level, "debug");
    }

    #[test]
    fn test_unknown_default_option_rejected() {
        let toml = r#"
[defaults]
owner = "x"
max_active_runs = 4
"#;
        let err = LoadstarConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("max_active_runs"));
    }

    #[test]
    fn test_invalid_schedule_rejected() {
        let toml = r#"
[defaults]
schedule = "every hour"
"#;
        let err = LoadstarConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("defaults.schedule"));
    }

    #[test]
    fn test_empty_owner_rejected() {
        let d = DefaultArgs {
            owner: "  ".to_string(),
            ..DefaultArgs::default()
        };
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_merge_overrides_sections() {
        let mut base = LoadstarConfig::from_toml(
            r#"
[warehouse]
connection_id = "base"

[credentials.a]
access_key_id = "A1"

[credentials.b]
access_key_id = "B1"
"#,
        )
        .unwrap();
        let overlay = LoadstarConfig::from_toml(
            r#"
[warehouse]
connection_id = "overlay"

[credentials.b]
access_key_id = "B2"
"#,
        )
        .unwrap();

        base.merge(overlay);
        assert_eq!(base.warehouse().connection_id, "overlay");
        assert_eq!(base.credentials["a"].access_key_id.as_deref(), Some("A1"));
        assert_eq!(base.credentials["b"].access_key_id.as_deref(), Some("B2"));
    }

    #[test]
    fn test_merge_keeps_base_when_overlay_empty() {
        let mut base = LoadstarConfig::from_toml("[logging]\nlevel = \"warn\"").unwrap();
        base.merge(LoadstarConfig::new());
        assert_eq!(base.logging().level, "warn");
    }

    #[test]
    fn test_plaintext_credentials_listed() {
        let config = LoadstarConfig::from_toml(
            r#"
[credentials.zeta]
access_key_id = "AK"
secret_access_key = "SK"

[credentials.alpha]
access_key_id = "AK"
secret_access_key = "SK"

[credentials.env_only]
access_key_id = "AK"
"#,
        )
        .unwrap();
        assert_eq!(config.plaintext_credentials(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_credential_config_debug_masks_both_halves() {
        let creds = CredentialConfig {
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("TOPSECRET".to_string()),
        };
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("AKIDEXAMPLE"));
        assert!(!debug.contains("TOPSECRET"));
        assert!(format!("{:?}", CredentialConfig::default()).contains("None"));
    }

    #[test]
    fn test_unknown_warehouse_key_rejected() {
        let toml = "[warehouse]\nconnection_id = \"dwh\"\nschema = \"public\"\n";
        let err = LoadstarConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("schema"));
    }

    #[test]
    fn test_roundtrip_serialize() {
        let mut config = LoadstarConfig::new();
        config.defaults = Some(DefaultArgs::default());
        config.warehouse = Some(WarehouseConfig::default());
        let serialized = config.to_toml().unwrap();
        let parsed = LoadstarConfig::from_toml(&serialized).unwrap();
        assert_eq!(parsed.defaults(), DefaultArgs::default());
        assert_eq!(parsed.warehouse().connection_id, "redshift");
    }
}
