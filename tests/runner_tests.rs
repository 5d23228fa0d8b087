//! File-based runner tests: datapoint files on disk, configuration files and
//! schema checks, the way the command line uses them.

mod common;

use common::{registry, series, Fixture};
use streamscript::runner::parse_datapoints;
use streamscript::{
    read_datapoints, ConfigLoader, EngineConfig, ObjectSchema, OutputFormat, PipelineError,
    PipelineTree, Runner, Value,
};

fn threshold_filter(limit: i64) -> PipelineTree {
    PipelineTree::transform(
        "filter",
        vec![PipelineTree::transform(
            "gte",
            vec![PipelineTree::transform("$", vec![]), PipelineTree::constant(limit)],
        )],
    )
}

#[test]
fn test_run_files_merges_inputs_in_timestamp_order() {
    let fixture = Fixture::new();
    let first = fixture.write("first.json", r#"[{"t": 1, "d": 10}, {"t": 4, "d": 2}]"#);
    let second = fixture.write(
        "second.jsonl",
        "{\"t\": 2, \"d\": 7}\n{\"t\": 3, \"d\": 30}\n",
    );

    let registry = registry();
    let runner = Runner::new(&registry, EngineConfig::default());
    let out = runner
        .run_files(&threshold_filter(5), &[first, second], Vec::new())
        .unwrap();

    let text = String::from_utf8(out).unwrap();
    assert_eq!(
        parse_datapoints(&text).unwrap(),
        series(&[(1.0, 10), (2.0, 7), (3.0, 30)])
    );
}

#[test]
fn test_run_files_writes_a_json_array_when_configured() {
    let fixture = Fixture::new();
    let input = fixture.write("input.json", r#"[{"t": 1, "d": 1}, {"t": 2, "d": 9}]"#);

    let mut config = EngineConfig::default();
    config.output.format = OutputFormat::Json;
    let registry = registry();
    let runner = Runner::new(&registry, config);
    let out = runner
        .run_files(&threshold_filter(5), &[input], Vec::new())
        .unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.trim_start().starts_with('['));
    assert_eq!(parse_datapoints(&text).unwrap(), series(&[(2.0, 9)]));
}

#[test]
fn test_unordered_input_file_is_rejected() {
    let fixture = Fixture::new();
    let input = fixture.write("input.json", r#"[{"t": 5, "d": 9}, {"t": 1, "d": 9}]"#);

    let registry = registry();
    let runner = Runner::new(&registry, EngineConfig::default());
    let err = runner
        .run_files(&threshold_filter(0), &[input.clone()], Vec::new())
        .unwrap_err();
    assert!(matches!(err, PipelineError::IteratorError { .. }));

    let mut config = EngineConfig::default();
    config.execution.validate_order = false;
    let runner = Runner::new(&registry, config);
    let out = runner
        .run_files(&threshold_filter(0), &[input], Vec::new())
        .unwrap();
    assert_eq!(parse_datapoints(&String::from_utf8(out).unwrap()).unwrap().len(), 2);
}

#[test]
fn test_missing_and_malformed_inputs_fail() {
    let fixture = Fixture::new();
    let missing = fixture.dir.path().join("missing.json");
    let err = read_datapoints(&missing).unwrap_err();
    assert!(matches!(err, PipelineError::IoError { .. }));

    let malformed = fixture.write("bad.jsonl", "{\"t\": 1, \"d\": 1}\n{\"t\": \n");
    let err = read_datapoints(&malformed).unwrap_err();
    assert!(err.to_string().contains("line 2"));
}

#[test]
fn test_config_file_drives_the_runner() {
    let fixture = Fixture::new();
    let config_path = fixture.write(
        "engine.toml",
        "[execution]\nmax_sources = 1\n\n[output]\nformat = \"json\"\n",
    );
    let config = ConfigLoader::new("STREAMSCRIPT_RUNNER_TEST")
        .load(Some(&config_path))
        .unwrap();
    assert_eq!(config.execution.max_sources, 1);
    assert_eq!(config.output.format, OutputFormat::Json);
    assert!(config.execution.fold_constants);

    let a = fixture.write("a.json", r#"[{"t": 1, "d": 1}]"#);
    let b = fixture.write("b.json", r#"[{"t": 2, "d": 2}]"#);
    let registry = registry();
    let runner = Runner::new(&registry, config);
    let err = runner
        .run_files(&threshold_filter(0), &[a, b], Vec::new())
        .unwrap_err();
    assert!(matches!(err, PipelineError::ConfigurationError { .. }));
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let fixture = Fixture::new();
    let config_path = fixture.write("engine.json", r#"{"execution": {"max_sources": 0}}"#);
    let err = ConfigLoader::new("STREAMSCRIPT_RUNNER_INVALID")
        .load(Some(&config_path))
        .unwrap_err();
    assert!(matches!(err, PipelineError::ConfigurationError { .. }));

    let unsupported = fixture.write("engine.yaml", "execution: {}");
    assert!(ConfigLoader::load_file(&unsupported).is_err());
}

#[test]
fn test_pipeline_tree_loads_from_file() {
    let fixture = Fixture::new();
    let script_path = fixture.write(
        "pipeline.json",
        r#"{"pipe": [{"transform": "$", "args": [{"constant": "v"}]}, {"transform": "sum"}]}"#,
    );
    let input = fixture.write(
        "input.jsonl",
        "{\"t\": 1, \"d\": {\"v\": 1.5}}\n{\"t\": 2, \"d\": {\"v\": 2.5}}\n",
    );

    let tree = PipelineTree::from_json(&std::fs::read_to_string(script_path).unwrap()).unwrap();
    let registry = registry();
    let runner = Runner::new(&registry, EngineConfig::default());
    let out = runner.run_files(&tree, &[input], Vec::new()).unwrap();

    let output = parse_datapoints(&String::from_utf8(out).unwrap()).unwrap();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].timestamp, 2.0);
    assert_eq!(output[0].data, Value::from(4.0));
}

#[test]
fn test_schema_checks_datapoint_payloads() {
    let schema = ObjectSchema::new(serde_json::json!({
        "type": "object",
        "properties": {
            "sensor": {"type": "string"},
            "reading": {"type": "number", "minimum": 0},
            "unit": {"type": "string", "enum": ["C", "F"], "default": "C"}
        },
        "required": ["sensor", "reading"]
    }))
    .unwrap();

    let good = Value::from(serde_json::json!({"sensor": "s1", "reading": 3}));
    assert!(schema.validate(&good).is_ok());

    let mut completed = good.clone();
    schema.validate_with_defaults(&mut completed).unwrap();
    assert_eq!(completed.get("unit").unwrap(), Some(&Value::from("C")));

    let negative = Value::from(serde_json::json!({"sensor": "s1", "reading": -1}));
    let err = schema.validate(&negative).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::SchemaValidationError { field: Some(ref f), .. } if f == "reading"
    ));

    let partial = Value::from(serde_json::json!({"unit": "F"}));
    assert!(schema.validate(&partial).is_err());
    assert!(schema.validate_update(&partial).is_ok());
}
