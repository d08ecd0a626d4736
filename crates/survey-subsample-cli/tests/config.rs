use std::fs;

use survey_subsample::config::{CalibrationMethod, ModelType};
use survey_subsample_cli::cli::command;
use survey_subsample_cli::config::RunConfig;

fn run_matches(args: &[&str]) -> clap::ArgMatches {
    let matches = command().try_get_matches_from(args).unwrap();
    let (name, sub) = matches.subcommand().unwrap();
    assert_eq!(name, "run");
    sub.clone()
}

#[test]
fn default_config_round_trips_through_json() {
    let config = RunConfig::default();
    let json = serde_json::to_string_pretty(&config).unwrap();
    let parsed: RunConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
    assert_eq!(parsed.dx_threshold, 150);
    assert_eq!(parsed.number_of_questions, 20);
    assert_eq!(parsed.n_threads, 4);
    assert_eq!(parsed.fit.n_splits, 5);
    assert_eq!(parsed.fit.seed, 42);
}

#[test]
fn partial_json_fills_defaults() {
    let parsed: RunConfig = serde_json::from_str(
        r#"{ "dx_threshold": 30, "fit": { "model": { "calibration": "Isotonic" } } }"#,
    )
    .unwrap();
    assert_eq!(parsed.dx_threshold, 30);
    assert_eq!(parsed.number_of_questions, 20);
    assert_eq!(parsed.fit.model.calibration, CalibrationMethod::Isotonic);
    assert_eq!(parsed.fit.seed, 42);
}

#[test]
fn flags_override_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let infile = dir.path().join("survey.csv");
    fs::write(&infile, "q1,Diagnosis_A\n1,0\n").unwrap();
    let config_path = dir.path().join("run.json");
    fs::write(
        &config_path,
        r#"{ "dx_threshold": 10, "number_of_questions": 7, "n_threads": 2 }"#,
    )
    .unwrap();

    let infile_str = infile.to_str().unwrap();
    let config_str = config_path.to_str().unwrap();
    let matches = run_matches(&[
        "survey-subsample",
        "run",
        infile_str,
        "out",
        "--config",
        config_str,
        "-n",
        "3",
        "--random-state",
        "7",
        "--features",
        "q1,q2",
        "--model-type",
        "extra_trees",
        "--no-report",
    ]);
    let config = RunConfig::from_arguments(&matches).unwrap();

    assert_eq!(config.dx_threshold, 10);
    assert_eq!(config.n_threads, 2);
    assert_eq!(config.number_of_questions, 3);
    assert_eq!(config.fit.seed, 7);
    assert_eq!(config.features, Some(vec!["q1".to_string(), "q2".to_string()]));
    assert_eq!(config.diagnoses, None);
    assert_eq!(config.fit.model.model_type.name(), "extra_trees");
    assert!(!config.report);
    assert!(config.degrade);
    assert_eq!(config.outdir.to_str(), Some("out"));
}

#[test]
fn missing_input_is_rejected() {
    let matches = run_matches(&["survey-subsample", "run", "does-not-exist.csv", "out"]);
    assert!(RunConfig::from_arguments(&matches).is_err());

    let matches = run_matches(&["survey-subsample", "run", "survey.parquet", "out"]);
    let err = RunConfig::from_arguments(&matches).unwrap_err();
    assert!(err.to_string().contains(".tsv or .csv"));
}

#[test]
fn model_type_override_keeps_tree_count() {
    let dir = tempfile::tempdir().unwrap();
    let infile = dir.path().join("survey.csv");
    fs::write(&infile, "q1,Diagnosis_A\n1,0\n").unwrap();
    let config_path = dir.path().join("run.json");
    let mut base = RunConfig::default();
    base.fit.model.model_type = ModelType::default().with_n_estimators(12);
    fs::write(&config_path, serde_json::to_string(&base).unwrap()).unwrap();

    let matches = run_matches(&[
        "survey-subsample",
        "run",
        infile.to_str().unwrap(),
        "out",
        "--config",
        config_path.to_str().unwrap(),
        "--model-type",
        "extra_trees",
    ]);
    let config = RunConfig::from_arguments(&matches).unwrap();
    assert_eq!(config.fit.model.model_type.n_estimators(), 12);
}
