//! Importance-based feature ranking strategies.
//!
//! All orderings contain every requested feature exactly once. The order of
//! `x_ids` is the base order used to break remaining ties.
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::error::{Result, SubsampleError};
use crate::tables::ImportanceTable;

/// Aggregate importance value per feature, aligned with `feature_ids`.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingTable {
    pub feature_ids: Vec<String>,
    pub scores: Vec<f64>,
}

impl RankingTable {
    pub fn score(&self, feature: &str) -> Option<f64> {
        self.feature_ids
            .iter()
            .position(|f| f == feature)
            .map(|i| self.scores[i])
    }
}

/// Disagreement between the top-`top_n` slices of two orderings.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsistencyReport {
    pub top_n: usize,
    /// Size of the symmetric difference of the two slices.
    pub difference: usize,
    /// Items of one slice missing from the other. Both slices hold `top_n`
    /// items, so this is half of `difference` and at most `top_n`.
    pub swapped: usize,
    /// `difference` as a percentage of `top_n`.
    pub percent: f64,
    pub only_in_aggregate: Vec<String>,
    pub only_in_top_n: Vec<String>,
}

/// Output of [`rank_features`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRanking {
    pub aggregate: Vec<String>,
    pub top_n: Vec<String>,
    pub fused: Vec<String>,
    pub consistency: ConsistencyReport,
    pub aggregate_scores: RankingTable,
    /// Number of diagnoses whose own top-`top_n` list contains each
    /// feature, aligned with `aggregate_scores.feature_ids`.
    pub occurrences: Vec<usize>,
}

impl FeatureRanking {
    /// Position-aligned `(aggregate, top_n, fused)` triples, best first.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str, &str)> + '_ {
        self.aggregate
            .iter()
            .zip(self.top_n.iter())
            .zip(self.fused.iter())
            .map(|((a, t), f)| (a.as_str(), t.as_str(), f.as_str()))
    }
}

/// Rank `x_ids` by the importances recorded in `table`.
///
/// # Parameters
///
/// * `table` - Importance table of a baseline fit, one row per diagnosis.
/// * `x_ids` - Features to rank; must all be columns of `table`.
/// * `top_n` - Slice length used by the top-N strategy and the consistency
///   report; must lie in `1..=x_ids.len()`.
///
/// # Returns
///
/// The aggregate, top-N and fused orderings together with the consistency
/// report between the first two.
///
/// # Errors
///
/// Fails before any work is done when `x_ids` is empty, `table` has no
/// rows, a feature is missing from `table`, or `top_n` is out of range.
pub fn rank_features(table: &ImportanceTable, x_ids: &[String], top_n: usize) -> Result<FeatureRanking> {
    if x_ids.is_empty() {
        return Err(SubsampleError::EmptyFeatures);
    }
    if table.is_empty() {
        return Err(SubsampleError::EmptyDiagnoses);
    }
    if top_n == 0 || top_n > x_ids.len() {
        return Err(SubsampleError::TopNOutOfRange {
            top_n,
            available: x_ids.len(),
        });
    }
    let columns = x_ids
        .iter()
        .map(|f| {
            table
                .feature_position(f)
                .ok_or_else(|| SubsampleError::UnknownColumn(f.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    let rows = importance_rows(table, &columns);
    let scores = aggregate_scores(&rows, x_ids.len());
    let aggregate = aggregate_sort(&scores);
    let occurrences = topn_occurrences(&rows, x_ids.len(), top_n);
    let top = topn_sort(&occurrences, &scores);
    let fused = fused_sort(&aggregate, &top);

    let names = |order: &[usize]| -> Vec<String> { order.iter().map(|&i| x_ids[i].clone()).collect() };
    let aggregate = names(&aggregate);
    let top = names(&top);
    let fused = names(&fused);
    let consistency = consistency(&aggregate, &top, top_n);

    log::info!(
        "top-{} slices of the aggregate and top-N rankings differ by {} of {} feature(s) (symmetric difference {}, {:.1}%)",
        top_n,
        consistency.swapped,
        top_n,
        consistency.difference,
        consistency.percent
    );

    Ok(FeatureRanking {
        aggregate,
        top_n: top,
        fused,
        consistency,
        aggregate_scores: RankingTable {
            feature_ids: x_ids.to_vec(),
            scores,
        },
        occurrences,
    })
}

/// Importance rows restricted to `columns`, ordered by diagnosis so that
/// floating-point sums do not depend on table row order.
fn importance_rows(table: &ImportanceTable, columns: &[usize]) -> Vec<Vec<f64>> {
    let mut rows: Vec<(&str, Vec<f64>)> = table
        .rows()
        .iter()
        .map(|r| (r.dx.as_str(), columns.iter().map(|&c| r.values[c]).collect()))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));
    rows.into_iter().map(|(_, v)| v).collect()
}

/// Column sums over all rows; non-finite entries contribute nothing.
fn aggregate_scores(rows: &[Vec<f64>], n_features: usize) -> Vec<f64> {
    let mut scores = vec![0.0; n_features];
    for row in rows {
        for (s, &v) in scores.iter_mut().zip(row) {
            if v.is_finite() {
                *s += v;
            }
        }
    }
    scores
}

/// Feature indices by descending score; ties keep base order.
fn aggregate_sort(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

/// Count, per feature, the rows whose own top-`top_n` includes it. Rows
/// holding any non-finite value belong to infeasible fits and are skipped.
fn topn_occurrences(rows: &[Vec<f64>], n_features: usize, top_n: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_features];
    for row in rows.iter().filter(|r| r.iter().all(|v| v.is_finite())) {
        for &i in aggregate_sort(row).iter().take(top_n) {
            counts[i] += 1;
        }
    }
    counts
}

/// Descending occurrence count, then descending aggregate score, then base
/// order.
fn topn_sort(occurrences: &[usize], scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..occurrences.len()).collect();
    order.sort_by(|&a, &b| match occurrences[b].cmp(&occurrences[a]) {
        Ordering::Equal => scores[b].total_cmp(&scores[a]),
        other => other,
    });
    order
}

/// Ascending mean of the two positions. The sum is compared instead of the
/// mean so ties are exact; ties fall back to the aggregate position.
fn fused_sort(aggregate: &[usize], top: &[usize]) -> Vec<usize> {
    let n = aggregate.len();
    let mut pos_aggregate = vec![0usize; n];
    let mut pos_top = vec![0usize; n];
    for (p, &i) in aggregate.iter().enumerate() {
        pos_aggregate[i] = p;
    }
    for (p, &i) in top.iter().enumerate() {
        pos_top[i] = p;
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&i| (pos_aggregate[i] + pos_top[i], pos_aggregate[i]));
    order
}

fn consistency(aggregate: &[String], top: &[String], top_n: usize) -> ConsistencyReport {
    let a: HashSet<&String> = aggregate[..top_n].iter().collect();
    let t: HashSet<&String> = top[..top_n].iter().collect();
    let only_in_aggregate: Vec<String> = aggregate[..top_n]
        .iter()
        .filter(|f| !t.contains(f))
        .cloned()
        .collect();
    let only_in_top_n: Vec<String> = top[..top_n]
        .iter()
        .filter(|f| !a.contains(f))
        .cloned()
        .collect();
    let swapped = only_in_aggregate.len();
    let difference = swapped + only_in_top_n.len();
    ConsistencyReport {
        top_n,
        difference,
        swapped,
        percent: difference as f64 / top_n as f64 * 100.0,
        only_in_aggregate,
        only_in_top_n,
    }
}
