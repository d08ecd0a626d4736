//! Nested stratified cross-validation of one calibrated ensemble per
//! diagnosis.
use ndarray::{Array2, Axis};

use crate::config::FitConfig;
use crate::cross_validation::StratifiedKFold;
use crate::data_handling::SurveyTable;
use crate::error::{Result, SubsampleError};
use crate::learner::{FittedLearner, FoldRecord, Learner};
use crate::metrics::FoldMetrics;
use crate::models::calibrated::CalibratedClassifier;
use crate::models::classifier_trait::ClassifierModel;
use crate::tables::{ImportanceTable, SummaryTable};

/// Everything produced by one [`fit_models`] call.
#[derive(Debug, Clone)]
pub struct FitOutput {
    /// One row per diagnosis, one column per requested feature.
    pub importances: ImportanceTable,
    /// One row per diagnosis.
    pub summaries: SummaryTable,
    pub learners: Vec<FittedLearner>,
}

/// Fit every diagnosis in `y_ids` on the features `x_ids`.
///
/// The outer splitter, the inner calibration splitter and the ensembles
/// all use `config.seed`. Diagnoses that cannot be stratified are kept in
/// the output with `feasible = false` and NaN scores.
pub fn fit_models(
    table: &SurveyTable,
    x_ids: &[String],
    y_ids: &[String],
    config: &FitConfig,
) -> Result<FitOutput> {
    if x_ids.is_empty() {
        return Err(SubsampleError::EmptyFeatures);
    }
    if y_ids.is_empty() {
        return Err(SubsampleError::EmptyDiagnoses);
    }
    config.validate()?;

    let x = table.feature_matrix(x_ids)?;
    let targets = y_ids
        .iter()
        .map(|dx| table.target(dx))
        .collect::<Result<Vec<_>>>()?;

    let mut importances = ImportanceTable::new(x_ids.to_vec());
    let mut summaries = SummaryTable::new();
    let mut learners = Vec::with_capacity(y_ids.len());

    for (dx, y) in y_ids.iter().zip(targets.iter()) {
        let fitted = fit_diagnosis(&x, y, dx, x_ids, config)?;
        summaries.push(fitted.summary().clone());
        importances.push(fitted.importance().clone())?;
        learners.push(fitted);
    }

    log::debug!(
        "fit {} diagnoses on {} features",
        y_ids.len(),
        x_ids.len()
    );

    Ok(FitOutput {
        importances,
        summaries,
        learners,
    })
}

fn fit_diagnosis(
    x: &Array2<f64>,
    y: &[u8],
    dx: &str,
    x_ids: &[String],
    config: &FitConfig,
) -> Result<FittedLearner> {
    let dx_n = y.iter().filter(|&&v| v == 1).count();
    let hc_n = y.len() - dx_n;
    let mut learner = Learner::new(dx, x_ids.to_vec(), hc_n, dx_n);

    if hc_n == 0 || dx_n == 0 {
        log::warn!("{}: only one class present (HC={}, Dx={}), skipping", dx, hc_n, dx_n);
        learner.mark_infeasible();
        return Ok(learner.finalize());
    }

    let outer = StratifiedKFold::new(config.n_splits, config.seed);
    let folds = match outer.split(y) {
        Ok(folds) => folds,
        Err(SubsampleError::InsufficientClassMembers { class, count, .. }) => {
            log::warn!(
                "{}: class {} has only {} samples for {} folds, skipping",
                dx,
                class,
                count,
                config.n_splits
            );
            learner.mark_infeasible();
            return Ok(learner.finalize());
        }
        Err(e) => return Err(e),
    };

    for (k, fold) in folds.iter().enumerate() {
        let x_train = x.select(Axis(0), &fold.train);
        let y_train: Vec<u8> = fold.train.iter().map(|&i| y[i]).collect();
        let x_valid = x.select(Axis(0), &fold.test);
        let y_valid: Vec<u8> = fold.test.iter().map(|&i| y[i]).collect();

        let mut clf = CalibratedClassifier::new(
            config.model.model_type.clone(),
            config.model.calibration,
            StratifiedKFold::new(config.n_splits, config.seed),
            config.seed,
        );
        match clf.fit(x_train.view(), &y_train) {
            Ok(()) => {}
            Err(SubsampleError::InsufficientClassMembers { class, count, .. }) => {
                log::warn!(
                    "{}: fold {} leaves class {} with {} training samples, too few to calibrate",
                    dx,
                    k,
                    class,
                    count
                );
                learner.mark_infeasible();
                return Ok(learner.finalize());
            }
            Err(e) => return Err(e),
        }

        let proba = clf.predict_proba(x_valid.view());
        let y_valid_pred: Vec<u8> = proba.iter().map(|&p| u8::from(p > 0.5)).collect();
        let y_train_pred = clf.predict(x_train.view());
        let metrics = FoldMetrics::evaluate(&y_train, &y_train_pred, &y_valid, &y_valid_pred);
        log::debug!(
            "{} fold {}: acc_valid={:.3} sensitivity={:.3} specificity={:.3}",
            dx,
            k,
            metrics.acc_valid,
            metrics.sensitivity,
            metrics.specificity
        );

        learner.push_fold(FoldRecord {
            metrics,
            importances: clf.member_importances(),
            proba,
            labels: y_valid,
        });
    }

    let fitted = learner.finalize();
    if fitted.summary().lr_pos.is_nan() {
        log::warn!("{}: undefined positive likelihood ratio", dx);
    }
    Ok(fitted)
}
