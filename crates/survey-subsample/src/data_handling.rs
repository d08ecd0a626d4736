//! Column-oriented survey dataset plus the pruning steps that turn a sparse
//! raw table into a dense one the fitting engine can consume.
//!
//! Missing values are stored as NaN.
use std::collections::{HashMap, HashSet};

use ndarray::{Array2, ArrayView1, Axis};
use serde::Serialize;

use crate::error::{Result, SubsampleError};

#[derive(Debug, Clone)]
pub struct SurveyTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    data: Array2<f64>,
    row_ids: Vec<String>,
}

impl SurveyTable {
    /// Build a table from column names and a row-major `(rows, columns)` matrix.
    pub fn new(columns: Vec<String>, data: Array2<f64>) -> Result<Self> {
        let row_ids = (0..data.nrows()).map(|i| i.to_string()).collect();
        Self::with_row_ids(columns, data, row_ids)
    }

    pub fn with_row_ids(columns: Vec<String>, data: Array2<f64>, row_ids: Vec<String>) -> Result<Self> {
        if columns.len() != data.ncols() {
            return Err(SubsampleError::ShapeMismatch {
                expected: data.ncols(),
                found: columns.len(),
            });
        }
        if row_ids.len() != data.nrows() {
            return Err(SubsampleError::ShapeMismatch {
                expected: data.nrows(),
                found: row_ids.len(),
            });
        }
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(SubsampleError::InvalidConfig(format!(
                    "duplicate column '{}'",
                    name
                )));
            }
        }
        Ok(SurveyTable {
            columns,
            index,
            data,
            row_ids,
        })
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SubsampleError::UnknownColumn(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<ArrayView1<f64>> {
        let idx = self.column_index(name)?;
        Ok(self.data.column(idx))
    }

    /// Dense feature matrix for `ids`, in the given order. Any missing
    /// value is an error.
    pub fn feature_matrix(&self, ids: &[String]) -> Result<Array2<f64>> {
        let indices = ids
            .iter()
            .map(|id| self.column_index(id))
            .collect::<Result<Vec<_>>>()?;
        let x = self.data.select(Axis(1), &indices);
        for (col, id) in ids.iter().enumerate() {
            if let Some(row) = x.column(col).iter().position(|v| v.is_nan()) {
                return Err(SubsampleError::MissingValue {
                    column: id.clone(),
                    row,
                });
            }
        }
        Ok(x)
    }

    /// Binary target vector for diagnosis column `name`.
    pub fn target(&self, name: &str) -> Result<Vec<u8>> {
        self.column(name)?
            .iter()
            .enumerate()
            .map(|(row, &v)| {
                if v.is_nan() {
                    Err(SubsampleError::MissingValue {
                        column: name.to_string(),
                        row,
                    })
                } else if v == 0.0 {
                    Ok(0)
                } else if v == 1.0 {
                    Ok(1)
                } else {
                    Err(SubsampleError::NonBinaryLabel {
                        column: name.to_string(),
                        row,
                        value: v,
                    })
                }
            })
            .collect()
    }

    /// Recode diagnosis columns stored as 0 (absent) / 2 (present) to 0/1.
    pub fn binarize_diagnoses(&mut self, diagnoses: &[String]) -> Result<()> {
        for dx in diagnoses {
            let idx = self.column_index(dx)?;
            self.data
                .column_mut(idx)
                .mapv_inplace(|v| if v == 2.0 { 1.0 } else { v });
        }
        Ok(())
    }

    /// Keep only rows with no missing value in any of `columns`.
    pub fn drop_incomplete_rows(&self, columns: &[String]) -> Result<SurveyTable> {
        let indices = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<Vec<_>>>()?;
        let keep: Vec<usize> = (0..self.nrows())
            .filter(|&r| indices.iter().all(|&c| !self.data[[r, c]].is_nan()))
            .collect();
        Ok(SurveyTable {
            columns: self.columns.clone(),
            index: self.index.clone(),
            data: self.data.select(Axis(0), &keep),
            row_ids: keep.iter().map(|&r| self.row_ids[r].clone()).collect(),
        })
    }

    /// Healthy-control / patient counts for each diagnosis, ascending by
    /// patient count. Missing values are not counted.
    pub fn prevalence(&self, diagnoses: &[String]) -> Result<Vec<Prevalence>> {
        let mut table = diagnoses
            .iter()
            .map(|dx| {
                let col = self.column(dx)?;
                Ok(Prevalence {
                    dx: dx.clone(),
                    hc: col.iter().filter(|&&v| v == 0.0).count(),
                    pt: col.iter().filter(|&&v| v == 1.0).count(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        table.sort_by(|a, b| a.pt.cmp(&b.pt).then_with(|| a.dx.cmp(&b.dx)));
        Ok(table)
    }
}

/// Class counts for one diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prevalence {
    #[serde(rename = "Dx")]
    pub dx: String,
    #[serde(rename = "HC")]
    pub hc: usize,
    #[serde(rename = "Pt")]
    pub pt: usize,
}

/// Dense dataset ready for fitting.
#[derive(Debug, Clone)]
pub struct PrunedDataset {
    pub table: SurveyTable,
    pub prevalence: Vec<Prevalence>,
    pub diagnoses: Vec<String>,
}

/// Drop diagnoses with fewer than `threshold` positives and rows with
/// missing values, repeating until every surviving diagnosis meets the
/// threshold on the dense table.
///
/// The first pass counts positives on the sparse table; later passes drop
/// incomplete rows across the features and remaining diagnoses before
/// counting, since removing rows can push a diagnosis below threshold.
pub fn prune(
    table: &SurveyTable,
    features: &[String],
    diagnoses: &[String],
    threshold: usize,
) -> Result<PrunedDataset> {
    if features.is_empty() {
        return Err(SubsampleError::EmptyFeatures);
    }
    if diagnoses.is_empty() {
        return Err(SubsampleError::EmptyDiagnoses);
    }

    let initial = table.prevalence(diagnoses)?;
    let low: HashSet<&str> = initial
        .iter()
        .filter(|p| p.pt < threshold)
        .map(|p| p.dx.as_str())
        .collect();
    let mut kept: Vec<String> = diagnoses
        .iter()
        .filter(|dx| !low.contains(dx.as_str()))
        .cloned()
        .collect();
    log::debug!(
        "dropped {} low-prevalence diagnoses on the sparse table",
        diagnoses.len() - kept.len()
    );

    loop {
        let mut columns: Vec<String> = features.to_vec();
        columns.extend(kept.iter().cloned());
        let dense = table.drop_incomplete_rows(&columns)?;
        let prevalence = dense.prevalence(&kept)?;

        let low: HashSet<&str> = prevalence
            .iter()
            .filter(|p| p.pt < threshold)
            .map(|p| p.dx.as_str())
            .collect();
        if low.is_empty() {
            log::info!(
                "pruned dataset: {} of {} rows, {} diagnoses",
                dense.nrows(),
                table.nrows(),
                kept.len()
            );
            return Ok(PrunedDataset {
                table: dense,
                prevalence,
                diagnoses: kept,
            });
        }
        log::debug!("dropping {:?} after densifying", low);
        kept.retain(|dx| !low.contains(dx.as_str()));
    }
}
