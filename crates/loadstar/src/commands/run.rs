//! Run command - execute a pipeline for one logical date.
//!
//! No warehouse driver ships with loadstar, so only `--dry-run` executes
//! here: statements go to a recording warehouse and are printed redacted.

use std::cell::RefCell;
use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::Args;
use loadstar_config::LoadstarConfig;
use loadstar_pipeline::{
    ConfigCredentials, CredentialProvider, Credentials, LocalRunner, RecordingWarehouse,
    RunContext, RunReport, TaskOutcome, TaskState,
};
use serde_json::Value;

use super::{Context, load_pipeline};

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Pipeline file (default: built-in sparkify pipeline)
    pub file: Option<PathBuf>,

    /// Logical date of the run (YYYY-MM-DD, YYYY-MM-DDTHH:MM[:SS] or RFC 3339, UTC)
    #[arg(long, value_parser = parse_logical_date)]
    pub date: DateTime<Utc>,

    /// Record and print statements instead of executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Run identifier (default: manual__<uuid>)
    #[arg(long)]
    pub run_id: Option<String>,

    /// Template parameter, repeatable
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,
}

/// Statements issued by one task, redacted for display.
#[derive(Debug, Clone, serde::Serialize)]
struct TaskStatements {
    task_id: String,
    state: TaskState,
    statements: Vec<String>,
}

/// Run the run command.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let pipeline = load_pipeline(args.file.as_deref(), ctx)?;

    if !args.dry_run {
        bail!(
            "no warehouse connection is available to the CLI; rerun with --dry-run, \
             or embed loadstar-pipeline and inject a Warehouse implementation"
        );
    }

    let mut run = RunContext::new(args.date);
    if let Some(run_id) = args.run_id {
        run = run.with_run_id(run_id);
    }
    for (key, value) in args.params {
        run = run.with_param(key, Value::String(value));
    }

    let config = ctx.loaded.config.clone();
    let (report, per_task) = tokio::task::spawn_blocking(move || {
        // Quality checks see one row so the whole graph is exercised.
        let warehouse = RecordingWarehouse::new().with_canned_records(vec![vec![Value::from(1)]]);
        let credentials = DryRunCredentials::new(config);
        let per_task = RefCell::new(Vec::new());
        let observer = |outcome: &TaskOutcome| {
            let statements = warehouse
                .take_statements()
                .iter()
                .map(|s| s.to_string())
                .collect();
            per_task.borrow_mut().push(TaskStatements {
                task_id: outcome.task_id.clone(),
                state: outcome.state.clone(),
                statements,
            });
        };
        let report = LocalRunner::new(&warehouse, &credentials)
            .with_observer(&observer)
            .run(&pipeline, &run);
        let per_task = per_task.into_inner();
        (report, per_task)
    })
    .await
    .context("dry run task panicked")?;

    if ctx.json_output {
        let out = serde_json::json!({
            "dry_run": true,
            "report": report,
            "tasks": per_task,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_dry_run(&report, &per_task);
    }

    let failed = report.failures().count();
    if failed > 0 {
        bail!("{} task(s) failed in pipeline '{}'", failed, report.pipeline);
    }
    Ok(())
}

fn print_dry_run(report: &RunReport, per_task: &[TaskStatements]) {
    println!(
        "Dry run of '{}' for {} (run {})",
        report.pipeline,
        report.logical_date.to_rfc3339(),
        report.run_id
    );
    for task in per_task {
        println!();
        println!("[{}] {}", task.task_id, task.state);
        for statement in &task.statements {
            for line in statement.lines() {
                println!("    {}", line);
            }
            println!();
        }
    }
}

/// Config credentials, falling back to placeholders so a dry run never
/// needs real secrets.
struct DryRunCredentials {
    inner: ConfigCredentials,
}

impl DryRunCredentials {
    fn new(config: LoadstarConfig) -> Self {
        Self {
            inner: ConfigCredentials::new(config),
        }
    }
}

impl CredentialProvider for DryRunCredentials {
    fn credentials(&self, id: &str) -> loadstar_pipeline::Result<Credentials> {
        match self.inner.credentials(id) {
            Ok(credentials) => Ok(credentials),
            Err(e) => {
                tracing::warn!(
                    credentials = id,
                    error = %e,
                    "using placeholder credentials for dry run"
                );
                Ok(Credentials::new("DRY-RUN-ACCESS-KEY", "DRY-RUN-SECRET-KEY"))
            }
        }
    }
}

/// Parse a logical date; naive values are taken as UTC.
fn parse_logical_date(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(midnight.and_utc());
    }
    Err(format!(
        "invalid date '{}': expected YYYY-MM-DD, YYYY-MM-DDTHH:MM[:SS] or RFC 3339",
        value
    ))
}

fn parse_param(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), val.to_string()))
        }
        _ => Err(format!("invalid param '{}': expected KEY=VALUE", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_date_only() {
        let dt = parse_logical_date("2019-01-12").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2019, 1, 12, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_naive_datetime() {
        let dt = parse_logical_date("2019-01-12T05:30").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2019, 1, 12, 5, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_rfc3339_converts_to_utc() {
        let dt = parse_logical_date("2019-01-12T02:00:00+02:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2019, 1, 12, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_invalid_date() {
        let err = parse_logical_date("12/01/2019").unwrap_err();
        assert!(err.contains("invalid date"));
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("region=us-west-2").unwrap(),
            ("region".to_string(), "us-west-2".to_string())
        );
        assert_eq!(parse_param("q=a=b").unwrap().1, "a=b");
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn test_dry_run_credentials_fall_back() {
        let creds = DryRunCredentials::new(LoadstarConfig::new())
            .credentials("loadstar_cli_test_absent")
            .unwrap();
        assert_eq!(creds.access_key, "DRY-RUN-ACCESS-KEY");
    }
}
