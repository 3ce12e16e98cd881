//! Declarative pipeline definition parser.
//!
//! Parses TOML pipeline files into [`PipelineDefinition`]s, validates them,
//! and builds [`Pipeline`]s of concrete operators.
//!
//! # Example TOML
//!
//! ```toml
//! [pipeline]
//! name = "sparkify"
//! description = "Load and transform song play data"
//!
//! [pipeline.defaults]
//! owner = "sparkify"
//! start_date = "2019-01-12T00:00:00Z"
//! retries = 3
//!
//! [[pipeline.tasks]]
//! id = "stage_events"
//! kind = "stage"
//! table = "staging_events"
//! bucket = "udacity-dend"
//! key = "log_data/{year}/{month}"
//! credentials = "aws_credentials"
//! format = "s3://udacity-dend/log_json_path.json"
//!
//! [[pipeline.tasks]]
//! id = "load_users"
//! kind = "dimension"
//! table = "users"
//! select = "@users"
//! dependencies = ["stage_events"]
//!
//! [[pipeline.tasks]]
//! id = "run_quality_checks"
//! kind = "quality"
//! checks = [{ table = "users", column = "userid" }]
//! dependencies = ["load_users"]
//! ```
//!
//! A `select` or SQL statement starting with `@` names one of the canonical
//! queries in [`crate::queries`].

use std::path::Path;

use loadstar_config::{DefaultArgs, LoadstarConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::operators::{
    DimensionLoader, ExternalDataLocation, FactLoader, JsonFormat, LoadMode, Marker, Operator,
    OperatorKind, QualityChecker, QualitySpec, SqlTask, StagingLoader,
};
use crate::pipeline::{Pipeline, plan_graph};
use crate::queries;

/// Top-level wrapper matching the TOML structure `[pipeline]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineFile {
    pub pipeline: PipelineDefinition,
}

/// A complete declarative pipeline definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineDefinition {
    /// Unique pipeline name.
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Scheduler defaults; replaces the config file's `[defaults]` when set.
    #[serde(default)]
    pub defaults: Option<DefaultArgs>,

    /// Tasks in declaration order.
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

/// A single task within a pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskDefinition {
    /// Unique task identifier within this pipeline.
    pub id: String,

    /// IDs of tasks that must complete before this one runs.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// What the task does, tagged by `kind`.
    #[serde(flatten)]
    pub spec: OperatorSpec,
}

/// Kind-specific task settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperatorSpec {
    /// Replace a staging table with files from object storage.
    Stage {
        table: String,
        /// Falls back to `[storage].bucket`.
        #[serde(default)]
        bucket: Option<String>,
        /// Key template, e.g. `log_data/{year}/{month}`.
        key: String,
        /// Credential set identifier.
        credentials: String,
        /// `auto` or a JSONPaths file; defaults to `auto`.
        #[serde(default)]
        format: Option<String>,
        /// Falls back to `[storage].region`.
        #[serde(default)]
        region: Option<String>,
    },

    /// Load the fact table.
    Fact {
        table: String,
        select: String,
        #[serde(default = "default_replace")]
        replace: bool,
    },

    /// Append to a dimension table.
    Dimension { table: String, select: String },

    /// Non-null count checks.
    Quality { checks: Vec<QualitySpec> },

    /// Fixed SQL statements.
    Sql { statements: Vec<String> },

    /// No-op boundary marker.
    Marker {},
}

fn default_replace() -> bool {
    true
}

/// Keys every task may carry regardless of kind.
const COMMON_TASK_KEYS: &[&str] = &["id", "kind", "dependencies"];

/// Kind-specific keys accepted in a task table, `None` for unknown kinds.
fn task_keys(kind: &str) -> Option<&'static [&'static str]> {
    let keys: &'static [&'static str] = match kind {
        "stage" => &["table", "bucket", "key", "credentials", "format", "region"],
        "fact" => &["table", "select", "replace"],
        "dimension" => &["table", "select"],
        "quality" => &["checks"],
        "sql" => &["statements"],
        "marker" => &[],
        _ => return None,
    };
    Some(keys)
}

/// Current name for a key used by older operator definitions.
fn renamed_key(key: &str) -> Option<&'static str> {
    match key {
        "format_as_json" => Some("format"),
        "s3_bucket" => Some("bucket"),
        "s3_key" => Some("key"),
        "aws_credentials_id" => Some("credentials"),
        "table_name" => Some("table"),
        "sql_select_stmt" => Some("select"),
        _ => None,
    }
}

impl OperatorSpec {
    pub fn kind(&self) -> OperatorKind {
        match self {
            OperatorSpec::Stage { .. } => OperatorKind::Stage,
            OperatorSpec::Fact { .. } => OperatorKind::Fact,
            OperatorSpec::Dimension { .. } => OperatorKind::Dimension,
            OperatorSpec::Quality { .. } => OperatorKind::Quality,
            OperatorSpec::Sql { .. } => OperatorKind::Sql,
            OperatorSpec::Marker {} => OperatorKind::Marker,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl PipelineFile {
    /// Parse a pipeline definition from a TOML string.
    ///
    /// Task tables are checked against the keys their kind accepts before
    /// deserializing, so a misspelled option fails instead of falling back
    /// to its default.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let raw: toml::Table = toml::from_str(toml_str).map_err(parse_error)?;
        check_task_keys(&raw)?;
        toml::Value::Table(raw).try_into().map_err(parse_error)
    }

    /// Load a pipeline definition from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::InvalidPipeline(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }
}

fn parse_error(e: toml::de::Error) -> PipelineError {
    PipelineError::InvalidPipeline(format!("TOML parse error: {}", e))
}

fn check_task_keys(raw: &toml::Table) -> Result<()> {
    let Some(tasks) = raw
        .get("pipeline")
        .and_then(|p| p.get("tasks"))
        .and_then(toml::Value::as_array)
    else {
        return Ok(());
    };

    for task in tasks.iter().filter_map(toml::Value::as_table) {
        // Unknown or missing kinds are reported by serde.
        let Some(kind) = task.get("kind").and_then(toml::Value::as_str) else {
            continue;
        };
        let Some(allowed) = task_keys(kind) else {
            continue;
        };
        let id = task.get("id").and_then(toml::Value::as_str).unwrap_or("");

        for key in task.keys().map(String::as_str) {
            if COMMON_TASK_KEYS.contains(&key) || allowed.contains(&key) {
                continue;
            }
            let reason = match renamed_key(key) {
                Some(current) if allowed.contains(&current) => {
                    format!("unknown key '{}' for {} task; use '{}'", key, kind, current)
                }
                _ if allowed.is_empty() => {
                    format!("unknown key '{}'; {} tasks take no options", key, kind)
                }
                _ => format!(
                    "unknown key '{}' for {} task (expected {})",
                    key,
                    kind,
                    allowed.join(", ")
                ),
            };
            return Err(PipelineError::invalid_config(id, reason));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl PipelineDefinition {
    /// Validate names and the dependency graph.
    ///
    /// Operator settings are checked by [`PipelineDefinition::build`].
    pub fn validate(&self) -> Result<()> {
        let nodes: Vec<(&str, &[String])> = self
            .tasks
            .iter()
            .map(|t| (t.id.as_str(), t.dependencies.as_slice()))
            .collect();
        plan_graph(&self.name, &nodes)?;
        if let Some(ref defaults) = self.defaults {
            defaults.validate()?;
        }
        Ok(())
    }

    /// Scheduler defaults in effect: the pipeline's own, else the config's.
    pub fn effective_defaults(&self, config: &LoadstarConfig) -> DefaultArgs {
        self.defaults.clone().unwrap_or_else(|| config.defaults())
    }

    /// Validate the definition and construct every operator.
    pub fn build(&self, config: &LoadstarConfig) -> Result<Pipeline> {
        self.validate()?;

        let mut builder = Pipeline::builder(&self.name)
            .description(&self.description)
            .defaults(self.effective_defaults(config));
        for task in &self.tasks {
            let operator = build_operator(task, config)?;
            builder = builder.boxed_task(operator, task.dependencies.clone());
        }

        let pipeline = builder.build()?;
        debug!(
            "Built pipeline '{}' with {} tasks",
            pipeline.name(),
            pipeline.len()
        );
        Ok(pipeline)
    }
}

// ---------------------------------------------------------------------------
// Operator construction
// ---------------------------------------------------------------------------

fn build_operator(task: &TaskDefinition, config: &LoadstarConfig) -> Result<Box<dyn Operator>> {
    let id = task.id.as_str();
    let operator: Box<dyn Operator> = match &task.spec {
        OperatorSpec::Stage {
            table,
            bucket,
            key,
            credentials,
            format,
            region,
        } => {
            let storage = config.storage();
            let bucket = bucket.clone().or(storage.bucket).ok_or_else(|| {
                PipelineError::invalid_config(id, "bucket is not set and [storage] has none")
            })?;
            let format = match format {
                Some(f) => {
                    JsonFormat::parse(f).map_err(|reason| PipelineError::invalid_config(id, reason))?
                }
                None => JsonFormat::Auto,
            };
            let location = ExternalDataLocation::new(bucket, key.clone());
            let mut loader =
                StagingLoader::new(id, table.clone(), location, credentials.clone(), format)?;
            if let Some(region) = region.clone().or(storage.region) {
                loader = loader.with_region(region);
            }
            Box::new(loader)
        }
        OperatorSpec::Fact {
            table,
            select,
            replace,
        } => Box::new(
            FactLoader::new(id, table.clone(), resolve_select(id, select)?)?
                .with_mode(LoadMode::from_replace(*replace)),
        ),
        OperatorSpec::Dimension { table, select } => Box::new(DimensionLoader::new(
            id,
            table.clone(),
            resolve_select(id, select)?,
        )?),
        OperatorSpec::Quality { checks } => Box::new(QualityChecker::new(id, checks.clone())?),
        OperatorSpec::Sql { statements } => {
            let statements = statements
                .iter()
                .map(|s| resolve_statement(id, s))
                .collect::<Result<Vec<_>>>()?;
            Box::new(SqlTask::new(id, statements)?)
        }
        OperatorSpec::Marker {} => Box::new(Marker::new(id)?),
    };
    Ok(operator)
}

fn resolve_select<'a>(task_id: &str, select: &'a str) -> Result<&'a str> {
    match select.trim().strip_prefix('@') {
        Some(name) => queries::named_select(name).ok_or_else(|| {
            PipelineError::invalid_config(task_id, format!("unknown query '@{}'", name))
        }),
        None => Ok(select),
    }
}

fn resolve_statement<'a>(task_id: &str, statement: &'a str) -> Result<&'a str> {
    match statement.trim().strip_prefix('@') {
        Some(name) => queries::named_ddl(name).ok_or_else(|| {
            PipelineError::invalid_config(task_id, format!("unknown statement '@{}'", name))
        }),
        None => Ok(statement),
    }
}
