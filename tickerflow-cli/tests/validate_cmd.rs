use assert_cmd::Command;
use tempfile::NamedTempFile;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().expect("tempfile");
    std::io::Write::write_all(&mut f, contents.as_bytes()).expect("write");
    f
}

#[test]
fn validate_command_returns_0_for_valid_config() {
    let doc = r#"
workflow_types:
  - name: daily
    stages:
      - stage: ingestion
      - stage: indicators
        gates:
          - gate: min_daily_bars
            min: 20
handlers:
  ingestion:
    program: ./bin/ingest
"#;
    let f = write_temp(doc);

    let bin = assert_cmd::cargo::cargo_bin!("tickerflow");
    Command::new(bin)
        .args(["validate", f.path().to_string_lossy().as_ref()])
        .assert()
        .success();
}

#[test]
fn validate_command_returns_2_for_out_of_order_stages() {
    let doc = r#"
workflow_types:
  - name: daily
    stages:
      - stage: signals
      - stage: ingestion
"#;
    let f = write_temp(doc);

    let bin = assert_cmd::cargo::cargo_bin!("tickerflow");
    Command::new(bin)
        .args(["validate", f.path().to_string_lossy().as_ref()])
        .assert()
        .code(2); // VALIDATION_FAILED
}

#[test]
fn validate_command_returns_2_for_unparseable_config() {
    let f = write_temp("workflow_types: [ {");

    let bin = assert_cmd::cargo::cargo_bin!("tickerflow");
    Command::new(bin)
        .args(["validate", f.path().to_string_lossy().as_ref()])
        .assert()
        .code(2);
}

#[test]
fn validate_command_json_output_lists_stages() {
    let doc = r#"{ "workflow_types": [ { "name": "w1", "stages": [ { "stage": "ingestion" }, { "stage": "signals" } ] } ] }"#;
    let f = write_temp(doc);

    let bin = assert_cmd::cargo::cargo_bin!("tickerflow");
    let out = Command::new(bin)
        .args(["validate", f.path().to_string_lossy().as_ref(), "--format", "json"])
        .output()
        .expect("run");
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(v["valid"], true);
    assert_eq!(v["workflow_types"][0]["stages"], serde_json::json!(["ingestion", "signals"]));
}
