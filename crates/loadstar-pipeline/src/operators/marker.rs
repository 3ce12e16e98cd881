//! No-op boundary task.

use tracing::info;

use super::{Operator, OperatorKind, TaskContext, validate_task_id};
use crate::error::Result;

/// Marks the start or end of a pipeline; issues no statements.
#[derive(Debug, Clone)]
pub struct Marker {
    task_id: String,
}

impl Marker {
    pub fn new(task_id: impl Into<String>) -> Result<Self> {
        let task_id = task_id.into();
        validate_task_id(&task_id)?;
        Ok(Self { task_id })
    }
}

impl Operator for Marker {
    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::Marker
    }

    fn execute(&self, _ctx: &TaskContext<'_>) -> Result<()> {
        info!(task = %self.task_id, "Reached marker");
        Ok(())
    }
}
