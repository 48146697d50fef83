use tickerflow_core::{
    parse_config_str, validate_config, validate_symbols, ConfigError, ConfigFormat, FailurePolicy,
    GateId, InsufficientAction, StageName,
};

fn daily_yaml() -> &'static str {
    r#"
workflow_types:
  - name: daily
    max_retries: 2
    concurrency: 4
    stage_concurrency:
      financial_data: 1
    stages:
      - stage: ingestion
      - stage: indicators
        gates:
          - gate: min_daily_bars
            min: 20
      - stage: financial_data
        required: false
      - stage: weekly_aggregation
        gates:
          - gate: min_daily_bars
            min: 5
            on_insufficient: defer
      - stage: signals
        failure_policy:
          kind: dead_letter_ratio
          max_ratio: 0.5
handlers:
  ingestion:
    program: ./bin/ingest
    args: ["--symbol", "{symbol}", "--stage", "{stage}"]
"#
}

#[test]
fn parse_yaml_and_validate_ok() {
    let parsed = parse_config_str(daily_yaml(), ConfigFormat::Yaml).unwrap();
    validate_config(&parsed.config).unwrap();

    let wt = parsed.config.workflow_type("daily").unwrap();
    assert_eq!(wt.max_retries, 2);
    assert_eq!(wt.immediate_retries, 1);
    assert_eq!(wt.handler_timeout_ms, 30_000);
    assert_eq!(wt.stage_concurrency.get(&StageName::FinancialData), Some(&1));
    assert_eq!(wt.stages.len(), 5);
    assert!(wt.stages[0].required);
    assert!(!wt.stage(StageName::FinancialData).unwrap().required);

    let weekly = wt.stage(StageName::WeeklyAggregation).unwrap();
    assert_eq!(weekly.gates[0].gate, GateId::MinDailyBars);
    assert_eq!(weekly.gates[0].on_insufficient, InsufficientAction::Defer);

    let signals = wt.stage(StageName::Signals).unwrap();
    assert_eq!(
        signals.failure_policy,
        FailurePolicy::DeadLetterRatio { max_ratio: 0.5 }
    );
}

#[test]
fn parse_auto_detects_yaml() {
    let parsed = parse_config_str(daily_yaml(), ConfigFormat::Auto).unwrap();
    assert_eq!(parsed.format, ConfigFormat::Yaml);
}

#[test]
fn parse_auto_detects_json() {
    let json = r#"{ "workflow_types": [ { "name": "w1", "stages": [ { "stage": "ingestion" } ] } ] }"#;
    let parsed = parse_config_str(json, ConfigFormat::Auto).unwrap();
    assert_eq!(parsed.format, ConfigFormat::Json);
    validate_config(&parsed.config).unwrap();
}

#[test]
fn handler_args_substitute_symbol_and_stage() {
    let parsed = parse_config_str(daily_yaml(), ConfigFormat::Yaml).unwrap();
    let cmd = parsed.config.handlers.get(&StageName::Ingestion).unwrap();
    assert_eq!(
        cmd.render_args("MSFT", StageName::Ingestion),
        vec!["--symbol", "MSFT", "--stage", "ingestion"]
    );
    assert_eq!(cmd.transient_exit_codes, vec![75]);
}

#[test]
fn unknown_workflow_type_is_reported() {
    let parsed = parse_config_str(daily_yaml(), ConfigFormat::Yaml).unwrap();
    let err = parsed.config.workflow_type("weekly").unwrap_err();
    assert!(matches!(err, ConfigError::UnknownWorkflowType(ref n) if n == "weekly"));
}

#[test]
fn unknown_stage_name_fails_to_parse() {
    let yaml = r#"
workflow_types:
  - name: daily
    stages:
      - stage: sentiment
"#;
    assert!(parse_config_str(yaml, ConfigFormat::Yaml).is_err());
}

#[test]
fn validate_rejects_out_of_order_and_duplicate_stages() {
    let yaml = r#"
workflow_types:
  - name: daily
    stages:
      - stage: indicators
      - stage: ingestion
      - stage: ingestion
"#;
    let parsed = parse_config_str(yaml, ConfigFormat::Yaml).unwrap();
    let err = validate_config(&parsed.config).unwrap_err();
    let paths: Vec<_> = err.violations.iter().map(|v| v.path.as_str()).collect();
    assert!(paths.contains(&"workflow_types[0].stages[1].stage"));
    assert!(paths.contains(&"workflow_types[0].stages[2].stage"));
    assert!(err
        .violations
        .iter()
        .any(|v| v.message.contains("must be unique")));
}

#[test]
fn validate_rejects_bad_limits() {
    let yaml = r#"
workflow_types:
  - name: "bad name"
    concurrency: 0
    stage_concurrency:
      signals: 2
    backoff:
      base_ms: 5000
      max_ms: 100
      factor: 0.5
    stages:
      - stage: ingestion
        failure_policy:
          kind: dead_letter_ratio
          max_ratio: 1.5
"#;
    let parsed = parse_config_str(yaml, ConfigFormat::Yaml).unwrap();
    let err = validate_config(&parsed.config).unwrap_err();
    let paths: Vec<_> = err.violations.iter().map(|v| v.path.clone()).collect();
    assert!(paths.contains(&"workflow_types[0].name".to_string()));
    assert!(paths.contains(&"workflow_types[0].concurrency".to_string()));
    assert!(paths.contains(&"workflow_types[0].stage_concurrency.signals".to_string()));
    assert!(paths.contains(&"workflow_types[0].backoff.factor".to_string()));
    assert!(paths.contains(&"workflow_types[0].backoff.base_ms".to_string()));
    assert!(paths.contains(&"workflow_types[0].stages[0].failure_policy.max_ratio".to_string()));
}

#[test]
fn validate_rejects_duplicate_workflow_types_and_gates() {
    let yaml = r#"
workflow_types:
  - name: daily
    stages:
      - stage: indicators
        gates:
          - gate: min_daily_bars
          - gate: min_daily_bars
  - name: daily
    stages:
      - stage: ingestion
"#;
    let parsed = parse_config_str(yaml, ConfigFormat::Yaml).unwrap();
    let err = validate_config(&parsed.config).unwrap_err();
    let paths: Vec<_> = err.violations.iter().map(|v| v.path.as_str()).collect();
    assert!(paths.contains(&"workflow_types[1].name"));
    assert!(paths.contains(&"workflow_types[0].stages[0].gates[1].gate"));
}

#[test]
fn symbols_must_be_uppercase_tickers_and_unique() {
    validate_symbols(&["AAPL".into(), "BRK.B".into(), "^GSPC".into(), "ES=F".into()]).unwrap();

    let err = validate_symbols(&["aapl".into(), "MSFT".into(), "MSFT".into()]).unwrap_err();
    assert_eq!(err.violations.len(), 2);
    assert_eq!(err.violations[0].path, "symbols[0]");
    assert_eq!(err.violations[1].path, "symbols[2]");

    assert!(validate_symbols(&[]).is_err());
}
