//! Durable storage for the result tables of a run.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::data_handling::Prevalence;
use crate::degradation::DegradationResult;
use crate::feature_selection::ranking::FeatureRanking;
use crate::learner::FittedLearner;
use crate::tables::{ImportanceTable, SummaryTable};

/// Destination for the tables produced by the pipeline stages.
pub trait ResultSink {
    fn write_prevalence(&mut self, prevalence: &[Prevalence]) -> Result<()>;

    /// Baseline learners, their summaries and importances.
    fn write_baseline(
        &mut self,
        learners: &[FittedLearner],
        summaries: &SummaryTable,
        importances: &ImportanceTable,
    ) -> Result<()>;

    fn write_ranking(&mut self, ranking: &FeatureRanking) -> Result<()>;

    fn write_degraded(&mut self, result: &DegradationResult) -> Result<()>;
}

/// Writes every table as a CSV file under one output directory.
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    /// Create the sink, creating `dir` if it does not exist.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        Ok(CsvSink { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn writer(&self, name: &str) -> Result<csv::Writer<fs::File>> {
        let path = self.dir.join(name);
        log::debug!("writing {}", path.display());
        csv::Writer::from_path(&path).with_context(|| format!("Failed to create {}", path.display()))
    }

    fn write_rows<T: Serialize>(&self, name: &str, rows: impl IntoIterator<Item = T>) -> Result<()> {
        let mut writer = self.writer(name)?;
        for row in rows {
            writer
                .serialize(row)
                .with_context(|| format!("Failed to write a row of {}", name))?;
        }
        writer.flush().with_context(|| format!("Failed to flush {}", name))?;
        Ok(())
    }

    fn write_learners(&self, name: &str, learners: &[FittedLearner]) -> Result<()> {
        let rows = learners.iter().flat_map(|learner| {
            let r = learner.record();
            (0..r.n_folds()).map(move |k| FoldRow {
                dx: &r.dx,
                n_features: r.x_ids.len(),
                fold: k,
                acc_train: r.acc_train()[k],
                acc_valid: r.acc_valid()[k],
                f1: r.f1()[k],
                sensitivity: r.sensitivity()[k],
                specificity: r.specificity()[k],
                lr_pos: r.lr_pos()[k],
                lr_neg: r.lr_neg()[k],
            })
        });
        self.write_rows(name, rows)
    }

    fn write_importances(&self, name: &str, table: &ImportanceTable) -> Result<()> {
        let mut writer = self.writer(name)?;
        let mut header = vec!["Dx".to_string(), "n_features".to_string()];
        header.extend(table.feature_ids().iter().cloned());
        writer.write_record(&header)?;
        for row in table.rows() {
            let mut record = vec![row.dx.clone(), row.n_features.to_string()];
            record.extend(row.values.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// One outer fold of a learner record.
#[derive(Serialize)]
struct FoldRow<'a> {
    #[serde(rename = "Dx")]
    dx: &'a str,
    n_features: usize,
    fold: usize,
    acc_train: f64,
    acc_valid: f64,
    #[serde(rename = "F1")]
    f1: f64,
    sensitivity: f64,
    specificity: f64,
    #[serde(rename = "LR+")]
    lr_pos: f64,
    #[serde(rename = "LR-")]
    lr_neg: f64,
}

#[derive(Serialize)]
struct RankingRow<'a> {
    #[serde(rename = "Aggregate")]
    aggregate: &'a str,
    #[serde(rename = "Top-N")]
    top_n: &'a str,
    #[serde(rename = "Average")]
    average: &'a str,
}

impl ResultSink for CsvSink {
    fn write_prevalence(&mut self, prevalence: &[Prevalence]) -> Result<()> {
        self.write_rows("prevalence.csv", prevalence)
    }

    fn write_baseline(
        &mut self,
        learners: &[FittedLearner],
        summaries: &SummaryTable,
        importances: &ImportanceTable,
    ) -> Result<()> {
        self.write_learners("learners.csv", learners)?;
        self.write_rows("summaries.csv", summaries.rows())?;
        self.write_importances("importances.csv", importances)
    }

    fn write_ranking(&mut self, ranking: &FeatureRanking) -> Result<()> {
        self.write_rows(
            "feature_importance.csv",
            ranking.rows().map(|(aggregate, top_n, average)| RankingRow {
                aggregate,
                top_n,
                average,
            }),
        )
    }

    fn write_degraded(&mut self, result: &DegradationResult) -> Result<()> {
        self.write_learners("learners_degraded.csv", &result.learners)?;
        self.write_rows("summaries_degraded.csv", result.summaries.rows())?;
        self.write_importances("importances_degraded.csv", &result.importances)
    }
}
