//! Dimension loader: append derived rows to a dimension table.

use tracing::{debug, info};

use super::{
    Operator, OperatorKind, TaskContext, validate_identifier, validate_select, validate_task_id,
};
use crate::error::Result;
use crate::statement::Statement;

/// Appends rows with `INSERT INTO <table> <select>`.
///
/// Existing rows are kept. Running the same load twice against a non-empty
/// table duplicates rows unless the select filters them out.
#[derive(Debug, Clone)]
pub struct DimensionLoader {
    task_id: String,
    table: String,
    select: String,
}

impl DimensionLoader {
    pub fn new(
        task_id: impl Into<String>,
        table: impl Into<String>,
        select: impl AsRef<str>,
    ) -> Result<Self> {
        let task_id = task_id.into();
        let table = table.into();
        validate_task_id(&task_id)?;
        validate_identifier(&task_id, "table", &table)?;
        let select = validate_select(&task_id, select.as_ref())?;

        Ok(Self {
            task_id,
            table,
            select,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn statement(&self) -> Statement {
        Statement::new(format!("INSERT INTO {} {}", self.table, self.select))
    }
}

impl Operator for DimensionLoader {
    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::Dimension
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> Result<()> {
        info!(task = %self.task_id, table = %self.table, "Loading dimension table");
        let statement = self.statement();
        debug!(task = %self.task_id, statement = %statement, "running");
        ctx.warehouse.run(&statement)?;
        Ok(())
    }
}
