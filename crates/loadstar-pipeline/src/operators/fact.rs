//! Fact loader: (re)populate the fact table from a derived query.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    Operator, OperatorKind, TaskContext, validate_identifier, validate_select, validate_task_id,
};
use crate::error::Result;
use crate::statement::Statement;

/// How a load treats rows already in the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// `TRUNCATE` then `INSERT`; re-runs leave exactly the query's rows.
    #[default]
    Replace,
    /// `INSERT` only; re-runs add duplicates.
    Append,
}

impl LoadMode {
    /// Map the `replace` flag of a pipeline definition.
    pub fn from_replace(replace: bool) -> Self {
        if replace {
            LoadMode::Replace
        } else {
            LoadMode::Append
        }
    }
}

/// Loads the fact table with `INSERT INTO <table> <select>`.
#[derive(Debug, Clone)]
pub struct FactLoader {
    task_id: String,
    table: String,
    select: String,
    mode: LoadMode,
}

impl FactLoader {
    /// A loader in [`LoadMode::Replace`].
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
            mode: LoadMode::Replace,
        })
    }

    pub fn with_mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    /// Statements issued per run, in order.
    pub fn statements(&self) -> Vec<Statement> {
        let insert = Statement::new(format!("INSERT INTO {} {}", self.table, self.select));
        match self.mode {
            LoadMode::Replace => vec![Statement::new(format!("TRUNCATE {}", self.table)), insert],
            LoadMode::Append => vec![insert],
        }
    }
}

impl Operator for FactLoader {
    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::Fact
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> Result<()> {
        info!(task = %self.task_id, table = %self.table, mode = ?self.mode, "Loading fact table");
        for statement in self.statements() {
            debug!(task = %self.task_id, statement = %statement, "running");
            ctx.warehouse.run(&statement)?;
        }
        Ok(())
    }
}
