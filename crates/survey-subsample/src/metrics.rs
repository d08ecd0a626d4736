//! Binary classification metrics derived from a confusion matrix.
//!
//! Undefined recalls and F1 scores collapse to 0.0; undefined likelihood
//! ratios are reported as NaN so callers can filter degenerate fits.

/// Counts of a binary confusion matrix (positive class = 1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &[u8], y_pred: &[u8]) -> Self {
        assert_eq!(
            y_true.len(),
            y_pred.len(),
            "labels and predictions must have equal lengths"
        );
        let mut cm = ConfusionMatrix::default();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t, p) {
                (1, 1) => cm.tp += 1,
                (0, 1) => cm.fp += 1,
                (1, _) => cm.fn_ += 1,
                _ => cm.tn += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn accuracy(&self) -> f64 {
        ratio_or_zero(self.tp + self.tn, self.total())
    }

    /// Recall of the positive class.
    pub fn sensitivity(&self) -> f64 {
        ratio_or_zero(self.tp, self.tp + self.fn_)
    }

    /// Recall of the negative class.
    pub fn specificity(&self) -> f64 {
        ratio_or_zero(self.tn, self.tn + self.fp)
    }

    pub fn f1(&self) -> f64 {
        ratio_or_zero(2 * self.tp, 2 * self.tp + self.fp + self.fn_)
    }

    /// Positive and negative likelihood ratios.
    ///
    /// LR+ is NaN without false positives, LR- is NaN without true
    /// negatives, and both are NaN when there are no positive samples.
    pub fn likelihood_ratios(&self) -> (f64, f64) {
        if self.tp + self.fn_ == 0 {
            return (f64::NAN, f64::NAN);
        }
        let sens = self.sensitivity();
        let lr_pos = if self.fp == 0 {
            f64::NAN
        } else {
            sens / (self.fp as f64 / (self.fp + self.tn) as f64)
        };
        let lr_neg = if self.tn == 0 {
            f64::NAN
        } else {
            (1.0 - sens) / self.specificity()
        };
        (lr_pos, lr_neg)
    }
}

fn ratio_or_zero(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Scores recorded for one outer cross-validation fold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoldMetrics {
    pub acc_train: f64,
    pub acc_valid: f64,
    pub f1: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub lr_pos: f64,
    pub lr_neg: f64,
}

impl FoldMetrics {
    pub fn evaluate(
        y_train: &[u8],
        y_train_pred: &[u8],
        y_valid: &[u8],
        y_valid_pred: &[u8],
    ) -> Self {
        let train = ConfusionMatrix::from_predictions(y_train, y_train_pred);
        let valid = ConfusionMatrix::from_predictions(y_valid, y_valid_pred);
        let (lr_pos, lr_neg) = valid.likelihood_ratios();
        if lr_pos.is_nan() || lr_neg.is_nan() {
            log::debug!("undefined likelihood ratio for confusion matrix {:?}", valid);
        }
        FoldMetrics {
            acc_train: train.accuracy(),
            acc_valid: valid.accuracy(),
            f1: valid.f1(),
            sensitivity: valid.sensitivity(),
            specificity: valid.specificity(),
            lr_pos,
            lr_neg,
        }
    }
}

/// Fraction of positives and mean predicted probability per probability bin.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCurve {
    pub mean_predicted: Vec<f64>,
    pub fraction_positive: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Reliability diagram over `n_bins` uniform bins in [0, 1]; empty bins
/// are omitted.
pub fn calibration_curve(proba: &[f64], labels: &[u8], n_bins: usize) -> CalibrationCurve {
    assert_eq!(proba.len(), labels.len(), "probabilities and labels must have equal lengths");
    let n_bins = n_bins.max(1);
    let mut sum_pred = vec![0.0; n_bins];
    let mut sum_pos = vec![0.0; n_bins];
    let mut counts = vec![0usize; n_bins];

    for (&p, &y) in proba.iter().zip(labels.iter()) {
        let bin = ((p * n_bins as f64) as usize).min(n_bins - 1);
        sum_pred[bin] += p;
        sum_pos[bin] += y as f64;
        counts[bin] += 1;
    }

    let mut curve = CalibrationCurve {
        mean_predicted: Vec::new(),
        fraction_positive: Vec::new(),
        counts: Vec::new(),
    };
    for bin in 0..n_bins {
        if counts[bin] > 0 {
            curve.mean_predicted.push(sum_pred[bin] / counts[bin] as f64);
            curve.fraction_positive.push(sum_pos[bin] / counts[bin] as f64);
            curve.counts.push(counts[bin]);
        }
    }
    curve
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confusion_counts() {
        let y = [1, 1, 0, 0, 1, 0];
        let p = [1, 0, 0, 1, 1, 0];
        let cm = ConfusionMatrix::from_predictions(&y, &p);
        assert_eq!(cm, ConfusionMatrix { tp: 2, fp: 1, tn: 2, fn_: 1 });
        assert!((cm.accuracy() - 4.0 / 6.0).abs() < 1e-12);
        assert!((cm.sensitivity() - 2.0 / 3.0).abs() < 1e-12);
        assert!((cm.specificity() - 2.0 / 3.0).abs() < 1e-12);
        assert!((cm.f1() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn likelihood_ratios_match_definition() {
        let cm = ConfusionMatrix { tp: 8, fn_: 2, tn: 6, fp: 4 };
        let (lrp, lrn) = cm.likelihood_ratios();
        // sensitivity 0.8, specificity 0.6
        assert!((lrp - 0.8 / 0.4).abs() < 1e-12);
        assert!((lrn - 0.2 / 0.6).abs() < 1e-12);
    }

    #[test]
    fn perfect_specificity_gives_undefined_lr_pos() {
        let cm = ConfusionMatrix { tp: 5, fn_: 5, tn: 10, fp: 0 };
        let (lrp, lrn) = cm.likelihood_ratios();
        assert!(lrp.is_nan());
        assert!((lrn - 0.5).abs() < 1e-12);
    }

    #[test]
    fn all_positive_predictions_give_undefined_lr_neg() {
        let y = [0, 1, 0, 1];
        let p = [1, 1, 1, 1];
        let (lrp, lrn) = ConfusionMatrix::from_predictions(&y, &p).likelihood_ratios();
        assert!((lrp - 1.0).abs() < 1e-12);
        assert!(lrn.is_nan());
    }

    #[test]
    fn missing_positive_class_gives_zero_recall() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 0], &[0, 1, 0]);
        assert_eq!(cm.sensitivity(), 0.0);
        assert_eq!(cm.f1(), 0.0);
        let (lrp, lrn) = cm.likelihood_ratios();
        assert!(lrp.is_nan() && lrn.is_nan());
    }

    #[test]
    fn calibration_curve_skips_empty_bins() {
        let proba = [0.05, 0.1, 0.85, 0.95];
        let labels = [0, 0, 1, 1];
        let curve = calibration_curve(&proba, &labels, 10);
        assert_eq!(curve.counts, vec![1, 1, 1, 1]);
        assert_eq!(curve.fraction_positive, vec![0.0, 0.0, 1.0, 1.0]);
    }
}
