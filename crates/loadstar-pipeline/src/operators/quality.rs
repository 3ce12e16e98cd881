//! Data-quality gate: every listed column must hold at least one non-null value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{Operator, OperatorKind, TaskContext, validate_identifier, validate_task_id};
use crate::error::{PipelineError, Result};
use crate::statement::Statement;
use crate::warehouse::Warehouse;

/// A `(table, column)` pair asserted to contain a non-null value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualitySpec {
    pub table: String,
    pub column: String,
}

impl QualitySpec {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn statement(&self) -> Statement {
        Statement::new(format!(
            "SELECT COUNT(*) FROM {} WHERE {} IS NOT NULL",
            self.table, self.column
        ))
    }

    /// Run the check and return the observed non-null count.
    pub fn check(&self, warehouse: &dyn Warehouse) -> Result<i64> {
        let statement = self.statement();
        debug!(statement = %statement, "running");
        let records = warehouse.get_records(&statement)?;

        let Some(cell) = records.first().and_then(|row| row.first()) else {
            return Err(self.failure(None, "returned no results"));
        };
        let count = count_value(cell)
            .ok_or_else(|| self.failure(None, format!("returned a non-numeric count {}", cell)))?;
        if count < 1 {
            return Err(self.failure(Some(count), "contained 0 non-null rows"));
        }
        Ok(count)
    }

    fn failure(&self, observed: Option<i64>, detail: impl Into<String>) -> PipelineError {
        PipelineError::DataQuality {
            table: self.table.clone(),
            column: self.column.clone(),
            observed,
            detail: detail.into(),
        }
    }
}

/// Drivers report `COUNT(*)` as signed, unsigned or decimal text.
fn count_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX))),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Checks a list of [`QualitySpec`]s in order, stopping at the first failure.
#[derive(Debug, Clone)]
pub struct QualityChecker {
    task_id: String,
    checks: Vec<QualitySpec>,
}

impl QualityChecker {
    pub fn new(task_id: impl Into<String>, checks: Vec<QualitySpec>) -> Result<Self> {
        let task_id = task_id.into();
        validate_task_id(&task_id)?;
        if checks.is_empty() {
            return Err(PipelineError::invalid_config(
                &task_id,
                "at least one quality check is required",
            ));
        }
        for check in &checks {
            validate_identifier(&task_id, "table", &check.table)?;
            validate_identifier(&task_id, "column", &check.column)?;
        }
        Ok(Self { task_id, checks })
    }

    pub fn checks(&self) -> &[QualitySpec] {
        &self.checks
    }
}

impl Operator for QualityChecker {
    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::Quality
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> Result<()> {
        for check in &self.checks {
            let count = check.check(ctx.warehouse)?;
            info!(
                task = %self.task_id,
                table = %check.table,
                column = %check.column,
                count,
                "Data quality on table {} check passed with {} records",
                check.table,
                count
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::context::RunContext;
    use crate::credentials::StaticCredentials;
    use crate::warehouse::{MockWarehouse, RecordingWarehouse};

    fn run(checker: &QualityChecker, wh: &dyn Warehouse) -> Result<()> {
        let run = RunContext::new(Utc::now());
        let creds = StaticCredentials::new();
        checker.execute(&TaskContext::new(wh, &creds, &run))
    }

    #[test]
    fn test_statement_text() {
        let spec = QualitySpec::new("users", "userid");
        assert_eq!(
            spec.statement().sql(),
            "SELECT COUNT(*) FROM users WHERE userid IS NOT NULL"
        );
    }

    #[test]
    fn test_passes_and_reports_count() {
        let wh = MockWarehouse::new();
        wh.seed(
            "songs",
            vec![json!({"songid": "a"}), json!({"songid": "b"}), json!({"songid": null})],
        );
        let count = QualitySpec::new("songs", "songid").check(&wh).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_all_null_column_fails() {
        let wh = MockWarehouse::new();
        wh.seed("artists", vec![json!({"artistid": null}); 4]);
        let err = QualitySpec::new("artists", "artistid").check(&wh).unwrap_err();
        match err {
            PipelineError::DataQuality {
                table,
                column,
                observed,
                ..
            } => {
                assert_eq!(table, "artists");
                assert_eq!(column, "artistid");
                assert_eq!(observed, Some(0));
            }
            other => panic!("expected data quality error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_result_fails_without_count() {
        let wh = RecordingWarehouse::new();
        let err = QualitySpec::new("time", "start_time").check(&wh).unwrap_err();
        assert!(err.is_data_quality());
        assert!(err.to_string().contains("returned no results"));
        assert!(matches!(err, PipelineError::DataQuality { observed: None, .. }));
    }

    #[test]
    fn test_string_and_unsigned_counts_accepted() {
        let wh = RecordingWarehouse::new().with_canned_records(vec![vec![json!("12")]]);
        assert_eq!(QualitySpec::new("t", "c").check(&wh).unwrap(), 12);
        let wh = RecordingWarehouse::new().with_canned_records(vec![vec![json!(3u64)]]);
        assert_eq!(QualitySpec::new("t", "c").check(&wh).unwrap(), 3);
    }

    #[test]
    fn test_non_numeric_count_fails() {
        let wh = RecordingWarehouse::new().with_canned_records(vec![vec![json!(true)]]);
        let err = QualitySpec::new("t", "c").check(&wh).unwrap_err();
        assert!(matches!(err, PipelineError::DataQuality { observed: None, .. }));
    }

    #[test]
    fn test_missing_table_is_warehouse_error() {
        let wh = MockWarehouse::new();
        let err = QualitySpec::new("nope", "c").check(&wh).unwrap_err();
        assert!(matches!(err, PipelineError::Warehouse(_)));
    }

    #[test]
    fn test_checker_stops_at_first_failure() {
        let wh = MockWarehouse::new();
        wh.seed("users", vec![json!({"userid": 1})]);
        wh.seed("songs", vec![json!({"songid": null})]);
        wh.seed("artists", vec![json!({"artistid": 1})]);
        let checker = QualityChecker::new(
            "run_quality_checks",
            vec![
                QualitySpec::new("users", "userid"),
                QualitySpec::new("songs", "songid"),
                QualitySpec::new("artists", "artistid"),
            ],
        )
        .unwrap();

        let err = run(&checker, &wh).unwrap_err();
        assert!(err.to_string().contains("Table 'songs'"));
        assert_eq!(wh.log().len(), 2);
    }

    #[test]
    fn test_checker_requires_checks() {
        let err = QualityChecker::new("q", Vec::new()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig { .. }));
    }

    #[test]
    fn test_checker_validates_identifiers() {
        let err = QualityChecker::new("q", vec![QualitySpec::new("users", "")]).unwrap_err();
        assert!(err.to_string().contains("column cannot be empty"));
    }
}
