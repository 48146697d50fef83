use assert_cmd::Command;
use std::fs;
use tempfile::TempDir;

fn config_with_handler(program: &str) -> String {
    format!(
        r#"
workflow_types:
  - name: daily
    max_retries: 0
    stages:
      - stage: ingestion
      - stage: indicators
handlers:
  ingestion:
    program: {program}
  indicators:
    program: {program}
"#
    )
}

fn write_config(dir: &TempDir, contents: &str) -> String {
    let path = dir.path().join("pipeline.yaml");
    fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

#[cfg(unix)]
#[test]
fn start_runs_every_stage_against_memory_store() {
    let tmp_dir = TempDir::new().unwrap();
    let config = write_config(&tmp_dir, &config_with_handler("true"));

    let out = Command::cargo_bin("tickerflow")
        .unwrap()
        .args([
            "start",
            &config,
            "--workflow-type",
            "daily",
            "--symbol",
            "AAPL",
            "--symbol",
            "MSFT",
            "--store",
            "memory",
            "--format",
            "json",
        ])
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(0));
    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["status"], "completed");
    let stages = summary["stages"].as_array().unwrap();
    assert_eq!(stages.len(), 2);
    assert_eq!(stages[0]["counters"]["succeeded"], 2);
    assert_eq!(stages[1]["counters"]["succeeded"], 2);
}

#[cfg(unix)]
#[test]
fn start_exits_3_when_a_required_stage_fails() {
    let tmp_dir = TempDir::new().unwrap();
    let config = write_config(&tmp_dir, &config_with_handler("false"));

    Command::cargo_bin("tickerflow")
        .unwrap()
        .args([
            "start",
            &config,
            "--workflow-type",
            "daily",
            "--symbol",
            "AAPL",
            "--store",
            "memory",
        ])
        .assert()
        .code(3); // RUN_FAILED
}

#[cfg(unix)]
#[test]
fn start_reads_symbols_file() {
    let tmp_dir = TempDir::new().unwrap();
    let config = write_config(&tmp_dir, &config_with_handler("true"));
    let symbols = tmp_dir.path().join("symbols.txt");
    fs::write(&symbols, "# watchlist\nAAPL\n\nMSFT  # big tech\nNVDA\n").unwrap();

    let out = Command::cargo_bin("tickerflow")
        .unwrap()
        .args([
            "start",
            &config,
            "--workflow-type",
            "daily",
            "--symbols-file",
            symbols.to_str().unwrap(),
            "--store",
            "memory",
            "--format",
            "json",
        ])
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(0));
    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["stages"][0]["counters"]["processed"], 3);
}

#[test]
fn start_rejects_unknown_workflow_type() {
    let tmp_dir = TempDir::new().unwrap();
    let config = write_config(&tmp_dir, &config_with_handler("true"));

    Command::cargo_bin("tickerflow")
        .unwrap()
        .args([
            "start",
            &config,
            "--workflow-type",
            "weekly",
            "--symbol",
            "AAPL",
            "--store",
            "memory",
        ])
        .assert()
        .code(2);
}

#[test]
fn start_rejects_missing_handler() {
    let tmp_dir = TempDir::new().unwrap();
    let doc = r#"
workflow_types:
  - name: daily
    stages:
      - stage: ingestion
"#;
    let config = write_config(&tmp_dir, doc);

    Command::cargo_bin("tickerflow")
        .unwrap()
        .args([
            "start",
            &config,
            "--workflow-type",
            "daily",
            "--symbol",
            "AAPL",
            "--store",
            "memory",
        ])
        .assert()
        .code(2);
}

#[test]
fn detach_creates_a_pending_run() {
    let tmp_dir = TempDir::new().unwrap();
    let config = write_config(&tmp_dir, &config_with_handler("true"));

    let out = Command::cargo_bin("tickerflow")
        .unwrap()
        .args([
            "start",
            &config,
            "--workflow-type",
            "daily",
            "--symbol",
            "AAPL",
            "--detach",
            "--store",
            "memory",
            "--format",
            "json",
        ])
        .output()
        .unwrap();

    assert!(out.status.success());
    let created: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(created["status"], "pending");
    assert!(uuid_like(created["workflow_id"].as_str().unwrap()));
}

#[test]
fn status_without_database_url_is_a_runtime_error() {
    Command::cargo_bin("tickerflow")
        .unwrap()
        .env_remove("TICKERFLOW_DATABASE_URL")
        .env_remove("DATABASE_URL")
        .args(["status", "8f14e45f-ceea-467f-a0e6-7e5d7c2a5b1e"])
        .assert()
        .code(4); // RUNTIME_ERROR
}

#[test]
fn status_rejects_malformed_workflow_id() {
    Command::cargo_bin("tickerflow")
        .unwrap()
        .args(["status", "not-a-uuid", "--store", "memory"])
        .assert()
        .code(4);
}

#[test]
fn migrate_refuses_memory_store() {
    Command::cargo_bin("tickerflow")
        .unwrap()
        .args(["migrate", "--store", "memory"])
        .assert()
        .code(2);
}

fn uuid_like(s: &str) -> bool {
    s.len() == 36 && s.chars().filter(|c| *c == '-').count() == 4
}
