//! Sequential in-process runner.
//!
//! [`LocalRunner`] executes a pipeline's tasks one at a time in topological
//! order against a single injected warehouse connection. It never retries.
//! When a task fails, every task downstream of it is skipped and marked
//! [`TaskState::UpstreamFailed`]; tasks on independent branches still run.

use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::context::RunContext;
use crate::credentials::CredentialProvider;
use crate::operators::{OperatorKind, TaskContext};
use crate::pipeline::Pipeline;
use crate::warehouse::Warehouse;

/// Final state of one task in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum TaskState {
    Success,
    /// The task ran and returned an error.
    Failed(String),
    /// Not run because a task it depends on failed.
    UpstreamFailed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Success => f.write_str("success"),
            TaskState::Failed(message) => write!(f, "failed: {}", message),
            TaskState::UpstreamFailed => f.write_str("upstream_failed"),
        }
    }
}

/// Outcome of a single task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub kind: OperatorKind,
    pub state: TaskState,
    /// Wall time spent in `execute`; zero for skipped tasks.
    pub duration_ms: u64,
}

/// Outcome of a whole run, tasks listed in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pipeline: String,
    pub run_id: String,
    pub logical_date: DateTime<Utc>,
    pub tasks: Vec<TaskOutcome>,
}

impl RunReport {
    /// Whether every task succeeded.
    pub fn succeeded(&self) -> bool {
        self.tasks.iter().all(|t| t.state == TaskState::Success)
    }

    pub fn state(&self, task_id: &str) -> Option<&TaskState> {
        self.tasks
            .iter()
            .find(|t| t.task_id == task_id)
            .map(|t| &t.state)
    }

    /// Tasks that ran and failed.
    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.tasks
            .iter()
            .filter(|t| matches!(t.state, TaskState::Failed(_)))
    }
}

/// Callback invoked after each task settles, skipped tasks included.
pub type TaskObserver<'a> = &'a dyn Fn(&TaskOutcome);

/// Runs tasks sequentially against one warehouse connection.
pub struct LocalRunner<'a> {
    warehouse: &'a dyn Warehouse,
    credentials: &'a dyn CredentialProvider,
    observer: Option<TaskObserver<'a>>,
}

impl<'a> LocalRunner<'a> {
    pub fn new(warehouse: &'a dyn Warehouse, credentials: &'a dyn CredentialProvider) -> Self {
        Self {
            warehouse,
            credentials,
            observer: None,
        }
    }

    /// Notify `observer` as each task finishes.
    pub fn with_observer(mut self, observer: TaskObserver<'a>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn settle(&self, outcomes: &mut Vec<TaskOutcome>, outcome: TaskOutcome) {
        if let Some(observer) = self.observer {
            observer(&outcome);
        }
        outcomes.push(outcome);
    }

    /// Execute every task once.
    ///
    /// Task errors are captured in the report rather than returned.
    pub fn run(&self, pipeline: &Pipeline, run: &RunContext) -> RunReport {
        info!(
            pipeline = %pipeline.name(),
            run_id = %run.run_id(),
            logical_date = %run.logical_date(),
            "Starting pipeline run"
        );

        let ctx = TaskContext::new(self.warehouse, self.credentials, run);
        let mut blocked: HashSet<String> = HashSet::new();
        let mut outcomes = Vec::with_capacity(pipeline.len());

        for task in pipeline.execution_order() {
            let operator = task.operator();
            let task_id = task.id().to_string();

            if blocked.contains(&task_id) {
                warn!(task = %task_id, "Skipping task: upstream failed");
                let outcome = TaskOutcome {
                    task_id,
                    kind: operator.kind(),
                    state: TaskState::UpstreamFailed,
                    duration_ms: 0,
                };
                self.settle(&mut outcomes, outcome);
                continue;
            }

            info!(task = %task_id, kind = %operator.kind(), "Running task");
            let started = Instant::now();
            let result = operator.execute(&ctx);
            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let state = match result {
                Ok(()) => {
                    info!(task = %task_id, duration_ms, "Task succeeded");
                    TaskState::Success
                }
                Err(e) => {
                    error!(task = %task_id, duration_ms, error = %e, "Task failed");
                    blocked.extend(pipeline.downstream(&task_id));
                    TaskState::Failed(e.to_string())
                }
            };

            let outcome = TaskOutcome {
                task_id,
                kind: operator.kind(),
                state,
                duration_ms,
            };
            self.settle(&mut outcomes, outcome);
        }

        let report = RunReport {
            pipeline: pipeline.name().to_string(),
            run_id: run.run_id().to_string(),
            logical_date: run.logical_date(),
            tasks: outcomes,
        };
        info!(
            pipeline = %report.pipeline,
            succeeded = report.succeeded(),
            "Finished pipeline run"
        );
        report
    }
}
