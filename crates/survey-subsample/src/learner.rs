//! Per-diagnosis accumulator of cross-validation outputs.
//!
//! A [`Learner`] only grows: every outer fold appends one entry to each
//! metric sequence. [`Learner::finalize`] consumes it once all folds are in
//! and produces the immutable [`FittedLearner`] with its summary and mean
//! importance vector.
use statrs::statistics::Statistics;

use crate::metrics::{calibration_curve, CalibrationCurve, FoldMetrics};
use crate::tables::{ImportanceRow, SummaryRow};

/// Everything recorded for one outer fold.
#[derive(Debug, Clone)]
pub struct FoldRecord {
    pub metrics: FoldMetrics,
    /// One importance vector per inner calibration sub-model.
    pub importances: Vec<Vec<f64>>,
    /// Calibrated positive-class probabilities on the held-out partition.
    pub proba: Vec<f64>,
    pub labels: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Learner {
    pub dx: String,
    pub x_ids: Vec<String>,
    /// Negative (healthy-control) sample count.
    pub hc_n: usize,
    /// Positive (diagnosed) sample count.
    pub dx_n: usize,
    feasible: bool,
    acc_train: Vec<f64>,
    acc_valid: Vec<f64>,
    f1: Vec<f64>,
    sen: Vec<f64>,
    spe: Vec<f64>,
    lr_pos: Vec<f64>,
    lr_neg: Vec<f64>,
    /// fold x sub-model x feature
    fi: Vec<Vec<Vec<f64>>>,
    proba: Vec<f64>,
    label: Vec<u8>,
}

impl Learner {
    pub fn new(dx: impl Into<String>, x_ids: Vec<String>, hc_n: usize, dx_n: usize) -> Self {
        Learner {
            dx: dx.into(),
            x_ids,
            hc_n,
            dx_n,
            feasible: true,
            acc_train: Vec::new(),
            acc_valid: Vec::new(),
            f1: Vec::new(),
            sen: Vec::new(),
            spe: Vec::new(),
            lr_pos: Vec::new(),
            lr_neg: Vec::new(),
            fi: Vec::new(),
            proba: Vec::new(),
            label: Vec::new(),
        }
    }

    /// Mark the diagnosis as impossible to fit; its summary and importances
    /// will be NaN.
    pub fn mark_infeasible(&mut self) {
        self.feasible = false;
    }

    pub fn is_feasible(&self) -> bool {
        self.feasible
    }

    pub fn push_fold(&mut self, fold: FoldRecord) {
        let m = fold.metrics;
        self.acc_train.push(m.acc_train);
        self.acc_valid.push(m.acc_valid);
        self.f1.push(m.f1);
        self.sen.push(m.sensitivity);
        self.spe.push(m.specificity);
        self.lr_pos.push(m.lr_pos);
        self.lr_neg.push(m.lr_neg);
        self.fi.push(fold.importances);
        self.proba.extend(fold.proba);
        self.label.extend(fold.labels);
    }

    pub fn n_folds(&self) -> usize {
        self.acc_valid.len()
    }

    pub fn acc_train(&self) -> &[f64] {
        &self.acc_train
    }

    pub fn acc_valid(&self) -> &[f64] {
        &self.acc_valid
    }

    pub fn f1(&self) -> &[f64] {
        &self.f1
    }

    pub fn sensitivity(&self) -> &[f64] {
        &self.sen
    }

    pub fn specificity(&self) -> &[f64] {
        &self.spe
    }

    pub fn lr_pos(&self) -> &[f64] {
        &self.lr_pos
    }

    pub fn lr_neg(&self) -> &[f64] {
        &self.lr_neg
    }

    pub fn fold_importances(&self) -> &[Vec<Vec<f64>>] {
        &self.fi
    }

    pub fn proba(&self) -> &[f64] {
        &self.proba
    }

    pub fn labels(&self) -> &[u8] {
        &self.label
    }

    /// Average sub-model importances within each outer fold, then average
    /// the fold means. Every fold holds the same number of sub-models, so
    /// this equals a flat mean over all nested vectors.
    fn mean_importance(&self) -> Vec<f64> {
        let n_features = self.x_ids.len();
        if !self.feasible || self.fi.is_empty() {
            return vec![f64::NAN; n_features];
        }
        let mut mean = vec![0.0; n_features];
        for fold in &self.fi {
            let mut fold_mean = vec![0.0; n_features];
            for sub in fold {
                for (m, v) in fold_mean.iter_mut().zip(sub) {
                    *m += v;
                }
            }
            let n_sub = fold.len().max(1) as f64;
            for (m, v) in mean.iter_mut().zip(fold_mean) {
                *m += v / n_sub;
            }
        }
        let n_folds = self.fi.len() as f64;
        mean.iter_mut().for_each(|m| *m /= n_folds);
        mean
    }

    /// Summarise the record. NaN in any fold propagates to the mean so a
    /// single degenerate fold marks the whole diagnosis.
    pub fn finalize(self) -> FittedLearner {
        let mean = |values: &[f64]| -> f64 {
            if !self.feasible || values.is_empty() {
                f64::NAN
            } else {
                values.mean()
            }
        };
        let summary = SummaryRow {
            dx: self.dx.clone(),
            n_features: self.x_ids.len(),
            hc_n: self.hc_n,
            dx_n: self.dx_n,
            feasible: self.feasible,
            acc_train: mean(&self.acc_train),
            acc_valid: mean(&self.acc_valid),
            f1: mean(&self.f1),
            sensitivity: mean(&self.sen),
            specificity: mean(&self.spe),
            lr_pos: mean(&self.lr_pos),
            lr_neg: mean(&self.lr_neg),
        };
        let importance = ImportanceRow {
            dx: self.dx.clone(),
            n_features: self.x_ids.len(),
            values: self.mean_importance(),
        };
        FittedLearner {
            record: self,
            summary,
            importance,
        }
    }
}

/// A finished learner record with its derived summary.
#[derive(Debug, Clone)]
pub struct FittedLearner {
    record: Learner,
    summary: SummaryRow,
    importance: ImportanceRow,
}

impl FittedLearner {
    pub fn record(&self) -> &Learner {
        &self.record
    }

    pub fn summary(&self) -> &SummaryRow {
        &self.summary
    }

    pub fn importance(&self) -> &ImportanceRow {
        &self.importance
    }

    /// Spread of the validation accuracy over outer folds.
    pub fn acc_valid_std(&self) -> f64 {
        if self.record.acc_valid.len() < 2 {
            return f64::NAN;
        }
        self.record.acc_valid.iter().std_dev()
    }

    /// Reliability diagram of the accumulated out-of-fold probabilities.
    pub fn calibration_curve(&self, n_bins: usize) -> CalibrationCurve {
        calibration_curve(&self.record.proba, &self.record.label, n_bins)
    }

    pub fn into_parts(self) -> (Learner, SummaryRow, ImportanceRow) {
        (self.record, self.summary, self.importance)
    }
}
