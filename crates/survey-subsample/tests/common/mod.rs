#![allow(dead_code)]

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use survey_subsample::config::{FitConfig, ModelConfig, ModelType};
use survey_subsample::data_handling::SurveyTable;

pub fn ids(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}{}", prefix, i)).collect()
}

/// `n_rows` subjects with `n_features` binary items and one balanced
/// diagnosis "dx". Item 0 agrees with the diagnosis 90% of the time, item 1
/// 75%, the rest are noise.
pub fn survey(n_rows: usize, n_features: usize, seed: u64) -> (SurveyTable, Vec<String>, Vec<String>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x_ids = ids("q", n_features);
    let mut columns = x_ids.clone();
    columns.push("dx".to_string());

    let mut data = Vec::with_capacity(n_rows * (n_features + 1));
    for row in 0..n_rows {
        let dx = (row % 2) as f64;
        for f in 0..n_features {
            let agree = match f {
                0 => 0.9,
                1 => 0.75,
                _ => 0.5,
            };
            let value = if rng.gen_bool(agree) { dx } else { 1.0 - dx };
            data.push(value);
        }
        data.push(dx);
    }
    let table = SurveyTable::new(columns, Array2::from_shape_vec((n_rows, n_features + 1), data).unwrap())
        .unwrap();
    (table, x_ids, vec!["dx".to_string()])
}

pub fn small_config(n_estimators: usize) -> FitConfig {
    FitConfig {
        n_splits: 5,
        seed: 42,
        model: ModelConfig {
            model_type: ModelType::default().with_n_estimators(n_estimators),
            ..Default::default()
        },
    }
}
