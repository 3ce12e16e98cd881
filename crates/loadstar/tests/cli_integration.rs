//! CLI integration tests for the loadstar command-line interface.
//!
//! Every test points `--config-dir` at a temp directory so neither the user's
//! config nor their log directory is touched.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the loadstar binary with an isolated config dir.
fn loadstar(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("loadstar").unwrap();
    cmd.arg("--config-dir")
        .arg(config_dir)
        .current_dir(config_dir)
        .env_remove("LOADSTAR_AWS_CREDENTIALS_ACCESS_KEY_ID")
        .env_remove("LOADSTAR_AWS_CREDENTIALS_SECRET_ACCESS_KEY");
    cmd
}

fn sparkify_file() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../pipelines/sparkify.toml")
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    loadstar(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    loadstar(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("loadstar"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    loadstar(dir.path()).arg("deploy").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Validate / Plan
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_validate_builtin() {
    let dir = TempDir::new().unwrap();
    loadstar(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline 'sparkify' is valid (11 tasks)"));
}

#[test]
fn test_validate_file_json() {
    let dir = TempDir::new().unwrap();
    let output = loadstar(dir.path())
        .args(["--json", "validate"])
        .arg(sparkify_file())
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["valid"], true);
    assert_eq!(value["tasks"], 11);
}

#[test]
fn test_validate_rejects_cycle() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("cycle.toml");
    std::fs::write(
        &file,
        r#"
[pipeline]
name = "cycle"
[[pipeline.tasks]]
id = "a"
kind = "marker"
dependencies = ["b"]
[[pipeline.tasks]]
id = "b"
kind = "marker"
dependencies = ["a"]
"#,
    )
    .unwrap();

    loadstar(dir.path())
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cycle detected"));
}

#[test]
fn test_validate_rejects_legacy_format() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("legacy.toml");
    std::fs::write(
        &file,
        r#"
[pipeline]
name = "legacy"
[[pipeline.tasks]]
id = "stage_songs"
kind = "stage"
table = "staging_songs"
bucket = "udacity-dend"
key = "song_data"
credentials = "aws_credentials"
format = ","
"#,
    )
    .unwrap();

    loadstar(dir.path())
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("stage_songs"));
}

#[test]
fn test_plan_shows_order_and_defaults() {
    let dir = TempDir::new().unwrap();
    loadstar(dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("begin_execution"))
        .stdout(predicate::str::contains("<- stage_events, stage_songs"))
        .stdout(predicate::str::contains("owner:            sparkify"))
        .stdout(predicate::str::contains("0 * * * *"));
}

#[test]
fn test_plan_json_order() {
    let dir = TempDir::new().unwrap();
    let output = loadstar(dir.path()).args(["--json", "plan"]).output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let tasks = value["tasks"].as_array().unwrap();
    assert_eq!(tasks.first().unwrap()["id"], "begin_execution");
    assert_eq!(tasks.last().unwrap()["id"], "stop_execution");
    assert_eq!(value["defaults"]["retries"], 3);
}

#[test]
fn test_plan_uses_config_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[defaults]\nowner = \"data-eng\"\nretries = 1\n",
    )
    .unwrap();
    loadstar(dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("owner:            data-eng"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Run
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_run_requires_dry_run() {
    let dir = TempDir::new().unwrap();
    loadstar(dir.path())
        .args(["run", "--date", "2019-01-12"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--dry-run"));
}

#[test]
fn test_run_requires_date() {
    let dir = TempDir::new().unwrap();
    loadstar(dir.path())
        .args(["run", "--dry-run"])
        .assert()
        .failure();
}

#[test]
fn test_run_rejects_bad_date() {
    let dir = TempDir::new().unwrap();
    loadstar(dir.path())
        .args(["run", "--dry-run", "--date", "yesterday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid date"));
}

#[test]
fn test_dry_run_prints_redacted_statements() {
    let dir = TempDir::new().unwrap();
    loadstar(dir.path())
        .args(["run", "--dry-run", "--date", "2019-01-12"])
        .arg(sparkify_file())
        .env("LOADSTAR_AWS_CREDENTIALS_ACCESS_KEY_ID", "AKIDEXAMPLE")
        .env("LOADSTAR_AWS_CREDENTIALS_SECRET_ACCESS_KEY", "wJalrXUtnFEMI")
        .assert()
        .success()
        .stdout(predicate::str::contains("[stage_events] success"))
        .stdout(predicate::str::contains("DELETE FROM staging_events"))
        .stdout(predicate::str::contains("FROM 's3://udacity-dend/log_data/2019/01'"))
        .stdout(predicate::str::contains("SECRET_ACCESS_KEY '****'"))
        .stdout(predicate::str::contains("TRUNCATE songplays"))
        .stdout(predicate::str::contains("wJalrXUtnFEMI").not())
        .stdout(predicate::str::contains("AKIDEXAMPLE").not());
}

#[test]
fn test_builtin_dry_run_reads_logical_month() {
    let dir = TempDir::new().unwrap();
    loadstar(dir.path())
        .args(["run", "--dry-run", "--date", "2018-11-03"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FROM 's3://udacity-dend/log_data/2018/11'"))
        .stdout(predicate::str::contains("REGION 'us-west-2'"));
}

#[test]
fn test_dry_run_json_report() {
    let dir = TempDir::new().unwrap();
    let output = loadstar(dir.path())
        .args(["--json", "run", "--dry-run", "--date", "2019-01-12T05:00"])
        .args(["--run-id", "scheduled__test"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["dry_run"], true);
    assert_eq!(value["report"]["run_id"], "scheduled__test");
    assert_eq!(value["report"]["pipeline"], "sparkify");
    assert_eq!(value["tasks"].as_array().unwrap().len(), 11);
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_path_respects_config_dir() {
    let dir = TempDir::new().unwrap();
    loadstar(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_then_show() {
    let dir = TempDir::new().unwrap();
    loadstar(dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config file"));
    assert!(dir.path().join("config.toml").is_file());

    loadstar(dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    loadstar(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bucket: udacity-dend"));
}

#[test]
fn test_config_init_local() {
    let dir = TempDir::new().unwrap();
    loadstar(dir.path())
        .args(["config", "init", "--local"])
        .assert()
        .success();
    assert!(dir.path().join("loadstar.toml").is_file());
}

#[test]
fn test_config_show_never_prints_plaintext_secret() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[credentials.aws_credentials]\naccess_key_id = \"AKIDEXAMPLE\"\nsecret_access_key = \"TOPSECRET\"\n",
    )
    .unwrap();
    loadstar(dir.path())
        .args(["--verbose", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plaintext"))
        .stdout(predicate::str::contains("TOPSECRET").not())
        .stdout(predicate::str::contains("AKIDEXAMPLE").not());
}
