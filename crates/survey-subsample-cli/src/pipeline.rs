//! End-to-end run: load, prune, fit, rank, degrade, persist, report.
use std::collections::HashSet;
use std::time::Instant;

use anyhow::{Context, Result};
use maud::{html, Markup};

use survey_subsample::data_handling::{prune, Prevalence, SurveyTable};
use survey_subsample::degradation::{degrading_fit, DegradationResult};
use survey_subsample::feature_selection::ranking::{rank_features, FeatureRanking};
use survey_subsample::io::{read_survey_table, CsvSink, ResultSink, SurveyReaderConfig};
use survey_subsample::model_fitting::{fit_models, FitOutput};
use survey_subsample::report::plots::{plot_calibration, plot_degradation, plot_importance, CurveMetric};
use survey_subsample::report::{Report, ReportSection};
use survey_subsample::tables::SummaryTable;

use crate::config::RunConfig;

/// What a run produced, for callers that want more than the files.
#[derive(Debug)]
pub struct RunOutput {
    pub features: Vec<String>,
    /// Diagnoses that survived pruning and the baseline fit.
    pub diagnoses: Vec<String>,
    pub prevalence: Vec<Prevalence>,
    pub baseline: FitOutput,
    pub ranking: FeatureRanking,
    pub degraded: Option<DegradationResult>,
}

pub fn run_pipeline(config: &RunConfig) -> Result<RunOutput> {
    let start = Instant::now();
    let mut sink = CsvSink::new(&config.outdir)?;

    let reader_config = SurveyReaderConfig {
        id_column: config.id_column.clone(),
        ..Default::default()
    };
    let mut table = read_survey_table(&config.infile, &reader_config)?;
    let (features, diagnoses) = resolve_columns(&table, config)?;
    log::info!(
        "{} survey items, {} candidate diagnoses",
        features.len(),
        diagnoses.len()
    );
    if config.number_of_questions > features.len() {
        anyhow::bail!(
            "number_of_questions (top_n) is {} but only {} survey items were selected",
            config.number_of_questions,
            features.len()
        );
    }

    table.binarize_diagnoses(&diagnoses)?;
    let pruned = prune(&table, &features, &diagnoses, config.dx_threshold)?;
    if pruned.diagnoses.is_empty() {
        anyhow::bail!(
            "No diagnosis has at least {} positive subjects after removing incomplete rows",
            config.dx_threshold
        );
    }
    sink.write_prevalence(&pruned.prevalence)?;

    // Baseline on the full item set; diagnoses the models cannot separate
    // (undefined LR+) are dropped before ranking.
    let mut baseline = fit_models(&pruned.table, &features, &pruned.diagnoses, &config.fit)
        .context("Baseline fit failed")?;
    let usable = baseline.summaries.usable_diagnoses();
    let keep: HashSet<&str> = usable.iter().map(String::as_str).collect();
    for row in baseline.summaries.rows() {
        if !keep.contains(row.dx.as_str()) {
            log::warn!("dropping {}: no usable baseline fit", row.dx);
        }
    }
    if usable.is_empty() {
        anyhow::bail!("No diagnosis produced a usable baseline fit");
    }
    baseline.summaries.retain(|r| keep.contains(r.dx.as_str()));
    baseline.importances.retain(|r| keep.contains(r.dx.as_str()));
    baseline.learners.retain(|l| keep.contains(l.record().dx.as_str()));
    sink.write_baseline(&baseline.learners, &baseline.summaries, &baseline.importances)?;
    log_summaries("baseline", &baseline.summaries);

    let ranking = rank_features(&baseline.importances, &features, config.number_of_questions)
        .context("Feature ranking failed")?;
    sink.write_ranking(&ranking)?;
    log::info!(
        "top {} items (fused): {}",
        config.number_of_questions,
        ranking.fused[..config.number_of_questions].join(", ")
    );

    let degraded = if config.degrade {
        let result = degrading_fit(&pruned.table, &ranking.fused, &usable, &config.fit, config.n_threads)
            .context("Degradation sweep failed")?;
        sink.write_degraded(&result)?;
        Some(result)
    } else {
        None
    };

    let output = RunOutput {
        features,
        diagnoses: usable,
        prevalence: pruned.prevalence,
        baseline,
        ranking,
        degraded,
    };

    if config.report {
        let report = build_report(config, &output)?;
        report.save_to_file(config.outdir.join("report.html"))?;
    }

    log::info!("run finished in {:.1?}", start.elapsed());
    Ok(output)
}

/// Feature and diagnosis columns from the config, or inferred from the
/// table header when not given.
pub fn resolve_columns(table: &SurveyTable, config: &RunConfig) -> Result<(Vec<String>, Vec<String>)> {
    let diagnoses: Vec<String> = match &config.diagnoses {
        Some(d) => d.clone(),
        None => table
            .columns()
            .iter()
            .filter(|c| c.starts_with(&config.diagnosis_prefix))
            .cloned()
            .collect(),
    };
    if diagnoses.is_empty() {
        anyhow::bail!(
            "No diagnosis columns given and none start with '{}'",
            config.diagnosis_prefix
        );
    }

    let features: Vec<String> = match &config.features {
        Some(f) => f.clone(),
        None => table
            .columns()
            .iter()
            .filter(|c| !diagnoses.contains(c))
            .cloned()
            .collect(),
    };
    if features.is_empty() {
        anyhow::bail!("No survey item columns left after removing diagnoses");
    }

    for column in features.iter().chain(diagnoses.iter()) {
        if !table.has_column(column) {
            anyhow::bail!("Column '{}' not found in {}", column, config.infile.display());
        }
    }
    Ok((features, diagnoses))
}

fn log_summaries(stage: &str, summaries: &SummaryTable) {
    for row in summaries.rows() {
        log::info!(
            "[{}] {}: acc_valid={:.3} F1={:.3} sensitivity={:.3} specificity={:.3} LR+={:.2} LR-={:.2}",
            stage,
            row.dx,
            row.acc_valid,
            row.f1,
            row.sensitivity,
            row.specificity,
            row.lr_pos,
            row.lr_neg
        );
    }
}

fn build_report(config: &RunConfig, output: &RunOutput) -> Result<Report> {
    let mut report = Report::new(
        "survey-subsample",
        env!("CARGO_PKG_VERSION"),
        None,
        "Survey Subsampling Report",
    );

    /* Section 1: Overview */
    {
        let mut section = ReportSection::new("Overview");
        section.add_content(html! {
            p {
                (output.features.len()) " survey items were evaluated against "
                (output.diagnoses.len()) " diagnoses. Each diagnosis was fit with a calibrated "
                (config.fit.model.model_type.name()) " under nested " (config.fit.n_splits)
                "-fold stratified cross-validation."
            }
            h3 { "Prevalence" }
            table {
                tr { th { "Dx" } th { "HC" } th { "Pt" } }
                @for p in &output.prevalence {
                    tr { td { (p.dx) } td { (p.hc) } td { (p.pt) } }
                }
            }
            h3 { "Baseline performance" }
            (summary_table(&output.baseline.summaries))
        });
        section.add_plot(plot_calibration(&output.baseline.learners, 10));
        report.add_section(section);
    }

    /* Section 2: Feature ranking */
    {
        let mut section = ReportSection::new("Feature Ranking");
        let consistency = &output.ranking.consistency;
        section.add_content(html! {
            p {
                "The top " (consistency.top_n) " items of the aggregate and top-N rankings differ by "
                (consistency.swapped) " of " (consistency.top_n) " item(s) (symmetric difference "
                (consistency.difference) ", " (format!("{:.1}", consistency.percent)) "%)."
            }
        });
        section.add_plot(plot_importance(&output.ranking, config.number_of_questions));
        section.add_content(html! {
            table {
                tr { th { "#" } th { "Aggregate" } th { "Top-N" } th { "Average" } }
                @for (i, (aggregate, top_n, fused)) in output.ranking.rows().enumerate() {
                    tr { td { (i + 1) } td { (aggregate) } td { (top_n) } td { (fused) } }
                }
            }
        });
        report.add_section(section);
    }

    /* Section 3: Degradation */
    if let Some(degraded) = &output.degraded {
        let mut section = ReportSection::new("Degradation");
        section.add_plot(plot_degradation(degraded, &output.diagnoses, CurveMetric::ValidationAccuracy));
        section.add_plot(plot_degradation(degraded, &output.diagnoses, CurveMetric::Sensitivity));
        report.add_section(section);
    }

    /* Section 4: Configuration */
    {
        let mut section = ReportSection::new("Configuration");
        section.add_content(html! {
            pre {
                code { (serde_json::to_string_pretty(config)?) }
            }
        });
        report.add_section(section);
    }

    Ok(report)
}

fn summary_table(summaries: &SummaryTable) -> Markup {
    html! {
        table {
            tr {
                th { "Dx" } th { "HC" } th { "Dx n" } th { "Acc (train)" } th { "Acc (valid)" }
                th { "F1" } th { "Sensitivity" } th { "Specificity" } th { "LR+" } th { "LR-" }
            }
            @for r in summaries.rows() {
                tr {
                    td { (r.dx) } td { (r.hc_n) } td { (r.dx_n) }
                    td { (format!("{:.3}", r.acc_train)) } td { (format!("{:.3}", r.acc_valid)) }
                    td { (format!("{:.3}", r.f1)) } td { (format!("{:.3}", r.sensitivity)) }
                    td { (format!("{:.3}", r.specificity)) } td { (format!("{:.2}", r.lr_pos)) }
                    td { (format!("{:.2}", r.lr_neg)) }
                }
            }
        }
    }
}
