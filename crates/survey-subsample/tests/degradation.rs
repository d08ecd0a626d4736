mod common;

use survey_subsample::tables::SummaryRow;
use survey_subsample::{degrading_fit, SummaryTable};

fn sorted_rows(table: &SummaryTable) -> Vec<SummaryRow> {
    let mut rows = table.rows().to_vec();
    rows.sort_by(|a, b| a.n_features.cmp(&b.n_features).then_with(|| a.dx.cmp(&b.dx)));
    rows
}

fn same_value(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

fn same_row(a: &SummaryRow, b: &SummaryRow) -> bool {
    a.dx == b.dx
        && a.n_features == b.n_features
        && a.feasible == b.feasible
        && [
            (a.acc_train, b.acc_train),
            (a.acc_valid, b.acc_valid),
            (a.f1, b.f1),
            (a.sensitivity, b.sensitivity),
            (a.specificity, b.specificity),
            (a.lr_pos, b.lr_pos),
            (a.lr_neg, b.lr_neg),
        ]
        .iter()
        .all(|&(x, y)| same_value(x, y))
}

#[test]
fn one_record_per_prefix_length() {
    let (table, x_ids, y_ids) = common::survey(100, 3, 9);
    let result = degrading_fit(&table, &x_ids, &y_ids, &common::small_config(8), 2).unwrap();

    assert_eq!(result.summaries.len(), 3);
    assert_eq!(result.learners.len(), 3);
    assert_eq!(result.importances.len(), 3);

    let mut order = result.completion_order.clone();
    order.sort_unstable();
    assert_eq!(order, vec![1, 2, 3]);

    let sizes: Vec<usize> = sorted_rows(&result.summaries).iter().map(|r| r.n_features).collect();
    assert_eq!(sizes, vec![1, 2, 3]);

    // Shorter prefixes leave their trailing importance columns empty.
    for row in result.importances.rows() {
        let defined = row.values.iter().filter(|v| !v.is_nan()).count();
        assert_eq!(defined, row.n_features);
    }

    let curve = result.curve("dx");
    assert_eq!(curve.iter().map(|p| p.0).collect::<Vec<_>>(), vec![3, 2, 1]);
}

#[test]
fn repeated_sweeps_agree_up_to_row_order() {
    let (table, x_ids, y_ids) = common::survey(80, 3, 21);
    let config = common::small_config(6);
    let first = degrading_fit(&table, &x_ids, &y_ids, &config, 3).unwrap();
    let second = degrading_fit(&table, &x_ids, &y_ids, &config, 3).unwrap();

    let a = sorted_rows(&first.summaries);
    let b = sorted_rows(&second.summaries);
    assert_eq!(a.len(), b.len());
    assert!(a.iter().zip(&b).all(|(x, y)| same_row(x, y)));
}

#[test]
fn worker_count_does_not_change_results() {
    let (table, x_ids, y_ids) = common::survey(80, 3, 4);
    let config = common::small_config(6);
    let serial = degrading_fit(&table, &x_ids, &y_ids, &config, 1).unwrap();
    let parallel = degrading_fit(&table, &x_ids, &y_ids, &config, 4).unwrap();
    assert_eq!(serial.completion_order, vec![3, 2, 1]);

    let a = sorted_rows(&serial.summaries);
    let b = sorted_rows(&parallel.summaries);
    assert!(a.iter().zip(&b).all(|(x, y)| same_row(x, y)));
}
