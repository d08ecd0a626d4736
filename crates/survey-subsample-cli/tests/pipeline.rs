use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use survey_subsample::config::ModelType;
use survey_subsample_cli::config::RunConfig;
use survey_subsample_cli::pipeline::run_pipeline;

/// Deterministic coin with roughly 30% heads.
fn flip(i: usize, salt: usize) -> bool {
    (i.wrapping_mul(2_654_435_761).wrapping_add(salt) >> 7) % 10 < 3
}

/// 120 subjects, 4 items, two diagnoses coded 0/2 and one rare diagnosis.
/// Item q0 tracks Diagnosis_A and item q1 tracks Diagnosis_B, each with
/// enough disagreement that every validation fold sees false positives.
fn write_survey(path: &Path) {
    let mut csv = String::from("subject,q0,q1,q2,q3,Diagnosis_A,Diagnosis_B,Diagnosis_Rare\n");
    for i in 0..120 {
        let a = i % 2;
        let b = (i / 2) % 2;
        let q0 = if flip(i, 17) { 1 - a } else { a };
        let q1 = if flip(i, 91) { 1 - b } else { b };
        let q2 = (i * 7) % 3;
        let q3 = if i == 5 { "NA".to_string() } else { ((i * 5) % 4).to_string() };
        let rare = if i < 3 { 2 } else { 0 };
        writeln!(
            csv,
            "s{},{},{},{},{},{},{},{}",
            i,
            q0,
            q1,
            q2,
            q3,
            a * 2,
            b * 2,
            rare
        )
        .unwrap();
    }
    fs::write(path, csv).unwrap();
}

fn config(dir: &Path) -> RunConfig {
    let infile = dir.join("survey.csv");
    write_survey(&infile);
    let mut config = RunConfig {
        infile,
        outdir: dir.join("results"),
        id_column: Some("subject".to_string()),
        dx_threshold: 20,
        number_of_questions: 2,
        n_threads: 2,
        ..Default::default()
    };
    config.fit.model.model_type = ModelType::default().with_n_estimators(6);
    config
}

#[test]
fn full_run_writes_tables_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let output = run_pipeline(&config).unwrap();

    assert_eq!(output.features, vec!["q0", "q1", "q2", "q3"]);
    // The rare diagnosis is pruned; the incomplete row is dropped.
    assert_eq!(output.prevalence.len(), 2);
    assert!(output.prevalence.iter().all(|p| p.hc + p.pt == 119));
    assert_eq!(output.ranking.fused.len(), 4);
    for dx in &output.diagnoses {
        assert!(output.baseline.summaries.get(dx).unwrap().is_usable());
    }

    let degraded = output.degraded.as_ref().unwrap();
    assert_eq!(degraded.summaries.len(), 4 * output.diagnoses.len());

    for name in [
        "prevalence.csv",
        "learners.csv",
        "summaries.csv",
        "feature_importance.csv",
        "learners_degraded.csv",
        "summaries_degraded.csv",
        "report.html",
    ] {
        assert!(config.outdir.join(name).is_file(), "{} missing", name);
    }
    let html = fs::read_to_string(config.outdir.join("report.html")).unwrap();
    assert!(html.contains("Feature Ranking"));
    assert!(html.contains("Degradation"));
}

#[test]
fn sweep_and_report_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.degrade = false;
    config.report = false;
    let output = run_pipeline(&config).unwrap();

    assert!(output.degraded.is_none());
    assert!(config.outdir.join("feature_importance.csv").is_file());
    assert!(!config.outdir.join("summaries_degraded.csv").exists());
    assert!(!config.outdir.join("report.html").exists());
}

#[test]
fn too_many_questions_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.number_of_questions = 10;
    let err = run_pipeline(&config).unwrap_err();
    assert!(format!("{:#}", err).contains("top_n"));
}
