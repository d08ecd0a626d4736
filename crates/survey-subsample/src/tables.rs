//! Result tables handed to the sink: per-diagnosis importances and summaries.
use serde::Serialize;

use crate::error::{Result, SubsampleError};

/// Per-diagnosis means of the recorded fold metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    #[serde(rename = "Dx")]
    pub dx: String,
    pub n_features: usize,
    #[serde(rename = "HC_n")]
    pub hc_n: usize,
    #[serde(rename = "Dx_n")]
    pub dx_n: usize,
    pub feasible: bool,
    pub acc_train: f64,
    pub acc_valid: f64,
    #[serde(rename = "F1")]
    pub f1: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    #[serde(rename = "LR+")]
    pub lr_pos: f64,
    #[serde(rename = "LR-")]
    pub lr_neg: f64,
}

impl SummaryRow {
    /// A diagnosis is usable downstream when it was fit and its positive
    /// likelihood ratio is defined.
    pub fn is_usable(&self) -> bool {
        self.feasible && !self.lr_pos.is_nan()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryTable {
    rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: SummaryRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, dx: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.dx == dx)
    }

    pub fn retain<F: FnMut(&SummaryRow) -> bool>(&mut self, f: F) {
        self.rows.retain(f);
    }

    /// Diagnoses whose rows pass [`SummaryRow::is_usable`], in row order.
    pub fn usable_diagnoses(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|r| r.is_usable())
            .map(|r| r.dx.clone())
            .collect()
    }

    pub fn concat(tables: impl IntoIterator<Item = SummaryTable>) -> SummaryTable {
        SummaryTable {
            rows: tables.into_iter().flat_map(|t| t.rows).collect(),
        }
    }
}

/// Mean importance of each feature for one diagnosis.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceRow {
    pub dx: String,
    /// Number of features the producing fit was trained on.
    pub n_features: usize,
    /// Aligned with the owning table's `feature_ids`.
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportanceTable {
    feature_ids: Vec<String>,
    rows: Vec<ImportanceRow>,
}

impl ImportanceTable {
    pub fn new(feature_ids: Vec<String>) -> Self {
        ImportanceTable {
            feature_ids,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: ImportanceRow) -> Result<()> {
        if row.values.len() != self.feature_ids.len() {
            return Err(SubsampleError::ShapeMismatch {
                expected: self.feature_ids.len(),
                found: row.values.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    pub fn rows(&self) -> &[ImportanceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, dx: &str) -> Option<&ImportanceRow> {
        self.rows.iter().find(|r| r.dx == dx)
    }

    pub fn feature_position(&self, feature: &str) -> Option<usize> {
        self.feature_ids.iter().position(|f| f == feature)
    }

    pub fn retain<F: FnMut(&ImportanceRow) -> bool>(&mut self, f: F) {
        self.rows.retain(f);
    }

    /// Stack tables row-wise. Columns are the union of all feature ids in
    /// first-seen order; values absent from a source table become NaN.
    pub fn concat(tables: impl IntoIterator<Item = ImportanceTable>) -> ImportanceTable {
        let tables: Vec<ImportanceTable> = tables.into_iter().collect();
        let mut feature_ids: Vec<String> = Vec::new();
        for table in &tables {
            for f in &table.feature_ids {
                if !feature_ids.contains(f) {
                    feature_ids.push(f.clone());
                }
            }
        }

        let mut rows = Vec::new();
        for table in tables {
            let positions: Vec<Option<usize>> = feature_ids
                .iter()
                .map(|f| table.feature_position(f))
                .collect();
            for row in table.rows {
                let values = positions
                    .iter()
                    .map(|p| p.map_or(f64::NAN, |i| row.values[i]))
                    .collect();
                rows.push(ImportanceRow {
                    dx: row.dx,
                    n_features: row.n_features,
                    values,
                });
            }
        }

        ImportanceTable { feature_ids, rows }
    }
}
