//! Error types for pipeline definition and task execution.

use thiserror::Error;

use crate::warehouse::WarehouseError;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building or executing a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Operator configuration rejected at construction time.
    #[error("Invalid configuration for task '{task_id}': {reason}")]
    InvalidConfig { task_id: String, reason: String },

    /// Invalid pipeline definition or dependency graph.
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// A source path template could not be resolved.
    #[error("Template error: {0}")]
    Template(String),

    /// Credentials could not be resolved.
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Warehouse connection or statement failure, passed through unmodified.
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    /// A data-quality assertion failed.
    #[error("Data quality check failed. Table '{table}' column '{column}': {detail}")]
    DataQuality {
        table: String,
        column: String,
        /// Observed non-null count, `None` when the query returned no usable row.
        observed: Option<i64>,
        detail: String,
    },

    /// Configuration loading error.
    #[error(transparent)]
    Config(#[from] loadstar_config::ConfigError),
}

impl PipelineError {
    /// Shorthand for a construction-time configuration error.
    pub(crate) fn invalid_config(task_id: &str, reason: impl Into<String>) -> Self {
        PipelineError::InvalidConfig {
            task_id: task_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a failed data-quality assertion.
    pub fn is_data_quality(&self) -> bool {
        matches!(self, PipelineError::DataQuality { .. })
    }
}
