//! Fixed SQL statements, run in order.

use tracing::{debug, info};

use super::{Operator, OperatorKind, TaskContext, validate_task_id};
use crate::error::{PipelineError, Result};
use crate::statement::Statement;

/// Runs a fixed list of statements, such as table DDL.
#[derive(Debug, Clone)]
pub struct SqlTask {
    task_id: String,
    statements: Vec<String>,
}

impl SqlTask {
    pub fn new<I, S>(task_id: impl Into<String>, statements: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let task_id = task_id.into();
        validate_task_id(&task_id)?;

        let mut trimmed = Vec::new();
        for statement in statements {
            let statement = statement.as_ref().trim();
            if statement.is_empty() {
                return Err(PipelineError::invalid_config(&task_id, "statement cannot be empty"));
            }
            trimmed.push(statement.to_string());
        }
        if trimmed.is_empty() {
            return Err(PipelineError::invalid_config(
                &task_id,
                "at least one statement is required",
            ));
        }

        Ok(Self {
            task_id,
            statements: trimmed,
        })
    }

    pub fn statements(&self) -> impl Iterator<Item = Statement> + '_ {
        self.statements.iter().map(Statement::new)
    }
}

impl Operator for SqlTask {
    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::Sql
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> Result<()> {
        info!(task = %self.task_id, count = self.statements.len(), "Running SQL statements");
        for statement in self.statements() {
            debug!(task = %self.task_id, statement = %statement, "running");
            ctx.warehouse.run(&statement)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::context::RunContext;
    use crate::credentials::StaticCredentials;
    use crate::warehouse::RecordingWarehouse;

    #[test]
    fn test_runs_in_order() {
        let task = SqlTask::new("create", ["CREATE TABLE a (x int)", "  CREATE TABLE b (y int);\n"]).unwrap();
        let wh = RecordingWarehouse::new();
        let run = RunContext::new(Utc::now());
        let creds = StaticCredentials::new();
        task.execute(&TaskContext::new(&wh, &creds, &run)).unwrap();

        let sql: Vec<String> = wh.statements().iter().map(|s| s.sql().to_string()).collect();
        assert_eq!(sql, vec!["CREATE TABLE a (x int)", "CREATE TABLE b (y int);"]);
    }

    #[test]
    fn test_rejects_empty_list_and_blank_statement() {
        assert!(SqlTask::new("s", Vec::<String>::new()).is_err());
        assert!(SqlTask::new("s", ["SELECT 1", " "]).is_err());
    }
}
