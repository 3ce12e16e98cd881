//! Warehouse statement execution seam.
//!
//! This module defines the [`Warehouse`] trait through which every task issues
//! its SQL. The connection behind it is owned by the caller: a task borrows it
//! for the duration of one `execute` call and never stores it.
//!
//! # Example
//!
//! ```
//! use loadstar_pipeline::{RecordingWarehouse, Statement, Warehouse};
//!
//! let warehouse = RecordingWarehouse::new();
//! warehouse.run(&Statement::new("TRUNCATE songplays")).unwrap();
//! assert_eq!(warehouse.statements().len(), 1);
//! ```

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

use crate::statement::Statement;

/// One result row; cells in column order.
pub type Record = Vec<Value>;

/// Errors raised by a warehouse connection.
///
/// Tasks never catch or rewrap these; they surface to the caller as-is.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// The connection could not be established or was lost.
    #[error("warehouse connection error: {0}")]
    Connection(String),

    /// The warehouse rejected or failed a statement.
    #[error("statement failed: {message}")]
    Statement { message: String },

    /// Any other driver-specific failure.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Trait for SQL execution against a warehouse connection.
///
/// Calls are synchronous and block until the statement completes.
/// Implementations must be `Send + Sync` so a runner can hand the same
/// connection to tasks on different threads (never concurrently in this crate).
pub trait Warehouse: Send + Sync {
    /// Execute a statement that returns no rows.
    ///
    /// Returns the number of affected rows where the driver reports it.
    fn run(&self, statement: &Statement) -> Result<u64, WarehouseError>;

    /// Execute a query and collect its rows.
    fn get_records(&self, statement: &Statement) -> Result<Vec<Record>, WarehouseError>;
}

/// Warehouse that records statements instead of executing them.
///
/// Used for dry runs and tests. Queries answer with the configured canned
/// records (empty by default).
#[derive(Debug, Default)]
pub struct RecordingWarehouse {
    statements: Mutex<Vec<Statement>>,
    canned_records: Vec<Record>,
}

impl RecordingWarehouse {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every query with these records.
    pub fn with_canned_records(mut self, records: Vec<Record>) -> Self {
        self.canned_records = records;
        self
    }

    /// Statements seen so far, in execution order.
    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().clone()
    }

    /// Drain recorded statements.
    pub fn take_statements(&self) -> Vec<Statement> {
        std::mem::take(&mut *self.statements.lock())
    }
}

impl Warehouse for RecordingWarehouse {
    fn run(&self, statement: &Statement) -> Result<u64, WarehouseError> {
        self.statements.lock().push(statement.clone());
        Ok(0)
    }

    fn get_records(&self, statement: &Statement) -> Result<Vec<Record>, WarehouseError> {
        self.statements.lock().push(statement.clone());
        Ok(self.canned_records.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock warehouse
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory warehouse for unit tests.
///
/// Understands just enough SQL to observe row counts: `DELETE FROM t`,
/// `TRUNCATE t`, `COPY t ...`, `INSERT INTO t <select>` and
/// `SELECT COUNT(*) FROM t WHERE c IS NOT NULL`. Inserted and copied row
/// counts are scripted per select text / table.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockWarehouse {
    state: Mutex<MockState>,
}

#[cfg(test)]
#[derive(Debug, Default)]
struct MockState {
    /// table -> rows, each row is column -> value
    tables: std::collections::HashMap<String, Vec<std::collections::HashMap<String, Value>>>,
    /// select text -> rows it produces
    selects: std::collections::HashMap<String, Vec<std::collections::HashMap<String, Value>>>,
    /// table -> rows a COPY into it produces
    copies: std::collections::HashMap<String, Vec<std::collections::HashMap<String, Value>>>,
    log: Vec<String>,
    fail_on: Option<String>,
}

#[cfg(test)]
impl MockWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows produced by `INSERT INTO _ <select>`.
    pub fn script_select(&self, select: &str, rows: Vec<Value>) {
        self.state
            .lock()
            .selects
            .insert(select.trim().to_string(), rows.into_iter().map(to_row).collect());
    }

    /// Rows produced by `COPY <table> ...`.
    pub fn script_copy(&self, table: &str, rows: Vec<Value>) {
        self.state
            .lock()
            .copies
            .insert(table.to_string(), rows.into_iter().map(to_row).collect());
    }

    /// Seed a table with rows.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.state
            .lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows.into_iter().map(to_row));
    }

    /// Fail any statement containing `needle`.
    pub fn fail_on(&self, needle: &str) {
        self.state.lock().fail_on = Some(needle.to_string());
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.state.lock().tables.get(table).map_or(0, Vec::len)
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    fn apply(&self, sql: &str) -> Result<Option<Vec<Record>>, WarehouseError> {
        let mut state = self.state.lock();
        state.log.push(sql.to_string());
        if let Some(ref needle) = state.fail_on
            && sql.contains(needle.as_str())
        {
            return Err(WarehouseError::Statement {
                message: format!("mock failure on '{}'", needle),
            });
        }

        let trimmed = sql.trim();
        let words: Vec<&str> = trimmed.split_whitespace().collect();
        match words.as_slice() {
            ["DELETE", "FROM", table, ..] | ["TRUNCATE", table, ..] => {
                state.tables.insert(table.to_string(), Vec::new());
                Ok(None)
            }
            ["COPY", table, ..] => {
                let rows = state.copies.get(*table).cloned().unwrap_or_default();
                state.tables.entry(table.to_string()).or_default().extend(rows);
                Ok(None)
            }
            ["INSERT", "INTO", table, ..] => {
                let prefix = format!("INSERT INTO {}", table);
                let select = trimmed[prefix.len()..].trim();
                let rows = state.selects.get(select).cloned().ok_or_else(|| {
                    WarehouseError::Statement {
                        message: format!("unscripted select: {}", select),
                    }
                })?;
                state.tables.entry(table.to_string()).or_default().extend(rows);
                Ok(None)
            }
            ["SELECT", "COUNT(*)", "FROM", table, "WHERE", column, "IS", "NOT", "NULL"] => {
                let rows = state.tables.get(*table).ok_or_else(|| {
                    WarehouseError::Statement {
                        message: format!("relation \"{}\" does not exist", table),
                    }
                })?;
                let count = rows
                    .iter()
                    .filter(|r| r.get(*column).is_some_and(|v| !v.is_null()))
                    .count();
                Ok(Some(vec![vec![Value::from(count as i64)]]))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
fn to_row(value: Value) -> std::collections::HashMap<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => std::collections::HashMap::new(),
    }
}

#[cfg(test)]
impl Warehouse for MockWarehouse {
    fn run(&self, statement: &Statement) -> Result<u64, WarehouseError> {
        self.apply(statement.sql()).map(|_| 0)
    }

    fn get_records(&self, statement: &Statement) -> Result<Vec<Record>, WarehouseError> {
        self.apply(statement.sql()).map(Option::unwrap_or_default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recording_warehouse_records_in_order() {
        let wh = RecordingWarehouse::new();
        wh.run(&Statement::new("DELETE FROM a")).unwrap();
        wh.get_records(&Statement::new("SELECT 1")).unwrap();
        let seen: Vec<String> = wh.statements().iter().map(|s| s.sql().to_string()).collect();
        assert_eq!(seen, vec!["DELETE FROM a", "SELECT 1"]);
    }

    #[test]
    fn test_recording_warehouse_canned_records() {
        let wh = RecordingWarehouse::new().with_canned_records(vec![vec![json!(7)]]);
        let records = wh.get_records(&Statement::new("SELECT COUNT(*) FROM t")).unwrap();
        assert_eq!(records, vec![vec![json!(7)]]);
    }

    #[test]
    fn test_take_statements_drains() {
        let wh = RecordingWarehouse::new();
        wh.run(&Statement::new("TRUNCATE t")).unwrap();
        assert_eq!(wh.take_statements().len(), 1);
        assert!(wh.statements().is_empty());
    }

    #[test]
    fn test_mock_counts_non_null() {
        let wh = MockWarehouse::new();
        wh.seed("users", vec![json!({"userid": 1}), json!({"userid": null})]);
        let records = wh
            .get_records(&Statement::new(
                "SELECT COUNT(*) FROM users WHERE userid IS NOT NULL",
            ))
            .unwrap();
        assert_eq!(records, vec![vec![json!(1)]]);
    }

    #[test]
    fn test_mock_fail_on() {
        let wh = MockWarehouse::new();
        wh.fail_on("TRUNCATE");
        let err = wh.run(&Statement::new("TRUNCATE t")).unwrap_err();
        assert!(err.to_string().contains("mock failure"));
    }
}
