//! Refit the models on shrinking prefixes of a feature ranking.
//!
//! Every prefix length from the full ranking down to one feature is an
//! independent [`fit_models`] call. Calls run on a dedicated rayon pool of
//! `workers` threads and borrow the dataset read-only; results are gathered
//! over a channel in the order the calls finish.
use std::panic::{catch_unwind, AssertUnwindSafe};

use crossbeam_channel::unbounded;

use crate::config::FitConfig;
use crate::data_handling::SurveyTable;
use crate::error::{Result, SubsampleError};
use crate::learner::FittedLearner;
use crate::model_fitting::{fit_models, FitOutput};
use crate::tables::{ImportanceTable, SummaryTable};

/// Default number of concurrent fits.
pub const DEFAULT_WORKERS: usize = 4;

/// Prefixes of `ranked` from the full list down to a single feature.
pub fn feature_subsets(ranked: &[String]) -> Vec<&[String]> {
    (1..=ranked.len()).rev().map(|n| &ranked[..n]).collect()
}

/// Concatenated outputs of a sweep, in completion order.
#[derive(Debug, Clone)]
pub struct DegradationResult {
    pub learners: Vec<FittedLearner>,
    pub summaries: SummaryTable,
    pub importances: ImportanceTable,
    /// Prefix length of each finished call, in the order it finished.
    pub completion_order: Vec<usize>,
}

impl DegradationResult {
    /// Summary rows for one diagnosis sorted by descending prefix length.
    pub fn curve(&self, dx: &str) -> Vec<(usize, f64, f64)> {
        let mut points: Vec<(usize, f64, f64)> = self
            .summaries
            .rows()
            .iter()
            .filter(|r| r.dx == dx)
            .map(|r| (r.n_features, r.acc_valid, r.sensitivity))
            .collect();
        points.sort_by(|a, b| b.0.cmp(&a.0));
        points
    }
}

type TaskResult = std::result::Result<Result<FitOutput>, String>;

/// Run one [`fit_models`] call per prefix of `ranked` on a pool of
/// `workers` threads.
///
/// Returns only once every call has finished. If any call fails or panics
/// the remaining calls still run to completion and the first failure, in
/// completion order, is returned as [`SubsampleError::WorkerFailure`].
pub fn degrading_fit(
    table: &SurveyTable,
    ranked: &[String],
    y_ids: &[String],
    config: &FitConfig,
    workers: usize,
) -> Result<DegradationResult> {
    if ranked.is_empty() {
        return Err(SubsampleError::EmptyFeatures);
    }
    if y_ids.is_empty() {
        return Err(SubsampleError::EmptyDiagnoses);
    }
    if workers == 0 {
        return Err(SubsampleError::InvalidConfig(
            "worker count must be at least 1".to_string(),
        ));
    }
    config.validate()?;
    for id in ranked.iter().chain(y_ids) {
        table.column_index(id)?;
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("degrading-fit-{}", i))
        .build()
        .map_err(|e| SubsampleError::InvalidConfig(format!("cannot start worker pool: {}", e)))?;

    let subsets = feature_subsets(ranked);
    log::info!(
        "degrading fit: {} subsets x {} diagnoses on {} workers",
        subsets.len(),
        y_ids.len(),
        workers
    );

    let (tx, rx) = unbounded::<(usize, TaskResult)>();
    // FIFO spawning starts the largest subsets first.
    pool.scope_fifo(|s| {
        for subset in subsets {
            let tx = tx.clone();
            s.spawn_fifo(move |_| {
                let n = subset.len();
                let result = catch_unwind(AssertUnwindSafe(|| fit_models(table, subset, y_ids, config)))
                    .map_err(|payload| panic_message(payload.as_ref()));
                log::debug!("subset of {} feature(s) finished", n);
                // The receiver outlives the scope.
                let _ = tx.send((n, result));
            });
        }
    });
    drop(tx);

    let mut completion_order = Vec::new();
    let mut outputs = Vec::new();
    let mut failure = None;
    for (n, result) in rx.iter() {
        completion_order.push(n);
        let reason = match result {
            Ok(Ok(output)) => {
                outputs.push(output);
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("panicked: {}", panic),
        };
        log::error!("degrading fit with {} feature(s) failed: {}", n, reason);
        failure.get_or_insert(SubsampleError::WorkerFailure {
            n_features: n,
            reason,
        });
    }
    if let Some(e) = failure {
        return Err(e);
    }

    let mut learners = Vec::new();
    let mut summaries = Vec::with_capacity(outputs.len());
    let mut importances = Vec::with_capacity(outputs.len());
    for output in outputs {
        learners.extend(output.learners);
        summaries.push(output.summaries);
        importances.push(output.importances);
    }

    Ok(DegradationResult {
        learners,
        summaries: SummaryTable::concat(summaries),
        importances: ImportanceTable::concat(importances),
        completion_order,
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn subsets_are_nested_prefixes() {
        let ranked = ids(&["f1", "f2", "f3"]);
        let subsets = feature_subsets(&ranked);
        assert_eq!(subsets.len(), 3);
        assert_eq!(subsets[0], &ranked[..]);
        assert_eq!(subsets[1], &ids(&["f1", "f2"])[..]);
        assert_eq!(subsets[2], &ids(&["f1"])[..]);
        assert!(subsets[0].starts_with(subsets[1]));
        assert!(feature_subsets(&[]).is_empty());
    }

    #[test]
    fn invalid_requests_fail_before_any_fit() {
        let table = SurveyTable::new(ids(&["q", "dx"]), Array2::zeros((4, 2))).unwrap();
        let config = FitConfig::default();
        assert!(matches!(
            degrading_fit(&table, &ids(&["q"]), &ids(&["dx"]), &config, 0),
            Err(SubsampleError::InvalidConfig(_))
        ));
        assert!(matches!(
            degrading_fit(&table, &[], &ids(&["dx"]), &config, 2),
            Err(SubsampleError::EmptyFeatures)
        ));
        assert!(matches!(
            degrading_fit(&table, &ids(&["q", "nope"]), &ids(&["dx"]), &config, 2),
            Err(SubsampleError::UnknownColumn(_))
        ));
    }

    #[test]
    fn task_errors_surface_as_worker_failure() {
        // A non-binary target passes the column checks but fails inside
        // every fit.
        let data = Array2::from_shape_vec((4, 2), vec![0.0, 0.0, 1.0, 1.0, 0.0, 3.0, 1.0, 1.0]).unwrap();
        let table = SurveyTable::new(ids(&["q", "dx"]), data).unwrap();
        let err = degrading_fit(&table, &ids(&["q"]), &ids(&["dx"]), &FitConfig::default(), 2).unwrap_err();
        match err {
            SubsampleError::WorkerFailure { n_features, reason } => {
                assert_eq!(n_features, 1);
                assert!(reason.contains("0/1"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
