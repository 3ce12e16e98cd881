//! Task operators.
//!
//! Each operator is immutable configuration built once at pipeline-definition
//! time. At run time it receives a [`TaskContext`] borrowing the warehouse
//! connection, the credential provider and the run context, issues its SQL,
//! and returns. Operators never retry, cache connections or keep state
//! between calls.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::RunContext;
use crate::credentials::CredentialProvider;
use crate::error::{PipelineError, Result};
use crate::warehouse::Warehouse;

pub mod dimension;
pub mod fact;
pub mod marker;
pub mod quality;
pub mod sql;
pub mod stage;

pub use dimension::DimensionLoader;
pub use fact::{FactLoader, LoadMode};
pub use marker::Marker;
pub use quality::{QualityChecker, QualitySpec};
pub use sql::SqlTask;
pub use stage::{ExternalDataLocation, JsonFormat, StagingLoader};

/// Collaborators injected into a single task invocation.
#[derive(Clone, Copy)]
pub struct TaskContext<'a> {
    /// Connection the task issues statements on.
    pub warehouse: &'a dyn Warehouse,
    /// Resolves credential identifiers.
    pub credentials: &'a dyn CredentialProvider,
    /// The run being executed.
    pub run: &'a RunContext,
}

impl<'a> TaskContext<'a> {
    pub fn new(
        warehouse: &'a dyn Warehouse,
        credentials: &'a dyn CredentialProvider,
        run: &'a RunContext,
    ) -> Self {
        Self {
            warehouse,
            credentials,
            run,
        }
    }
}

/// The kinds of task a pipeline can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    Stage,
    Fact,
    Dimension,
    Quality,
    Sql,
    Marker,
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperatorKind::Stage => "stage",
            OperatorKind::Fact => "fact",
            OperatorKind::Dimension => "dimension",
            OperatorKind::Quality => "quality",
            OperatorKind::Sql => "sql",
            OperatorKind::Marker => "marker",
        };
        f.write_str(name)
    }
}

/// A unit of work in a pipeline.
pub trait Operator: Send + Sync + fmt::Debug {
    /// Unique task identifier within its pipeline.
    fn task_id(&self) -> &str;

    fn kind(&self) -> OperatorKind;

    /// Run the task once, blocking until its statements complete.
    fn execute(&self, ctx: &TaskContext<'_>) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Construction-time validation
// ---------------------------------------------------------------------------

/// Check a task id is usable.
pub(crate) fn validate_task_id(task_id: &str) -> Result<()> {
    if task_id.trim().is_empty() {
        return Err(PipelineError::invalid_config(task_id, "task id cannot be empty"));
    }
    Ok(())
}

/// Check a table or column identifier.
///
/// Accepts plain and schema-qualified names (`public.songplays`) and
/// double-quoted reserved words (`"level"`).
pub(crate) fn validate_identifier(task_id: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PipelineError::invalid_config(
            task_id,
            format!("{} cannot be empty", field),
        ));
    }

    if !value.split('.').all(valid_identifier_part) {
        return Err(PipelineError::invalid_config(
            task_id,
            format!("{} '{}' is not a valid identifier", field, value),
        ));
    }

    Ok(())
}

/// One dotted segment: a bare name, or a name wrapped in a pair of quotes.
fn valid_identifier_part(part: &str) -> bool {
    let name = match part.strip_prefix('"') {
        Some(rest) => match rest.strip_suffix('"') {
            Some(inner) => inner,
            None => return false,
        },
        None => part,
    };
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check and normalize a SELECT expression.
pub(crate) fn validate_select(task_id: &str, select: &str) -> Result<String> {
    let trimmed = select.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::invalid_config(
            task_id,
            "SELECT expression cannot be empty",
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_accepts_plain_and_qualified() {
        validate_identifier("t", "table", "songplays").unwrap();
        validate_identifier("t", "table", "public.staging_events").unwrap();
        validate_identifier("t", "column", "\"level\"").unwrap();
    }

    #[test]
    fn test_identifier_rejects_empty() {
        let err = validate_identifier("load_users", "table", " ").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig { .. }));
        assert!(err.to_string().contains("load_users"));
        assert!(err.to_string().contains("table cannot be empty"));
    }

    #[test]
    fn test_identifier_rejects_injection() {
        assert!(validate_identifier("t", "table", "users; DROP TABLE users").is_err());
        assert!(validate_identifier("t", "table", "a..b").is_err());
        assert!(validate_identifier("t", "table", ".users").is_err());
    }

    #[test]
    fn test_identifier_requires_paired_quotes() {
        validate_identifier("t", "table", "public.\"time\"").unwrap();
        assert!(validate_identifier("t", "table", "users\"").is_err());
        assert!(validate_identifier("t", "table", "\"").is_err());
        assert!(validate_identifier("t", "table", "\"\"").is_err());
        assert!(validate_identifier("t", "column", "\"le\"vel\"").is_err());
        assert!(validate_identifier("t", "table", "\"public.users\"").is_err());
    }

    #[test]
    fn test_select_trimmed() {
        let select = validate_select("t", "\n   SELECT 1\n").unwrap();
        assert_eq!(select, "SELECT 1");
    }

    #[test]
    fn test_select_rejects_blank() {
        assert!(validate_select("t", "  \n\t").is_err());
    }

    #[test]
    fn test_task_id_rejects_blank() {
        assert!(validate_task_id("").is_err());
        validate_task_id("stage_events").unwrap();
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(OperatorKind::Stage.to_string(), "stage");
        assert_eq!(OperatorKind::Quality.to_string(), "quality");
    }
}
