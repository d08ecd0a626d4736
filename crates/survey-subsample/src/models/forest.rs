//! Bagged tree ensembles (random forest and extremely randomized trees).
use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{ClassWeight, ModelType};
use crate::error::{Result, SubsampleError};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::tree::{DecisionTree, Splitter, TreeParams};

/// Tree ensemble classifier configured from a [`ModelType`].
pub struct ForestClassifier {
    model_type: ModelType,
    seed: u64,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl ForestClassifier {
    pub fn new(model_type: ModelType, seed: u64) -> Self {
        ForestClassifier {
            model_type,
            seed,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    fn settings(&self, n_features: usize) -> (usize, TreeParams, bool, ClassWeight) {
        match &self.model_type {
            ModelType::RandomForest {
                n_estimators,
                max_depth,
                min_samples_split,
                min_samples_leaf,
                max_features,
                bootstrap,
                class_weight,
            } => (
                *n_estimators,
                TreeParams {
                    max_depth: *max_depth,
                    min_samples_split: *min_samples_split,
                    min_samples_leaf: *min_samples_leaf,
                    max_features: max_features.resolve(n_features),
                    splitter: Splitter::Best,
                },
                *bootstrap,
                *class_weight,
            ),
            ModelType::ExtraTrees {
                n_estimators,
                max_depth,
                min_samples_split,
                min_samples_leaf,
                max_features,
                class_weight,
            } => (
                *n_estimators,
                TreeParams {
                    max_depth: *max_depth,
                    min_samples_split: *min_samples_split,
                    min_samples_leaf: *min_samples_leaf,
                    max_features: max_features.resolve(n_features),
                    splitter: Splitter::Random,
                },
                false,
                *class_weight,
            ),
        }
    }
}

/// Per-class weights `[w_neg, w_pos]` for the (possibly resampled) counts.
///
/// `Balanced` gives `total / (2 * class_total)` so both classes carry the
/// same total weight.
pub fn class_weights(y: &[u8], counts: &[f64], mode: ClassWeight) -> [f64; 2] {
    if mode == ClassWeight::Uniform {
        return [1.0, 1.0];
    }
    let mut totals = [0.0f64; 2];
    for (&label, &c) in y.iter().zip(counts.iter()) {
        totals[label as usize] += c;
    }
    let n = totals[0] + totals[1];
    let weight = |t: f64| if t > 0.0 { n / (2.0 * t) } else { 0.0 };
    [weight(totals[0]), weight(totals[1])]
}

impl ClassifierModel for ForestClassifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[u8]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(SubsampleError::ShapeMismatch {
                expected: x.nrows(),
                found: y.len(),
            });
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(SubsampleError::InvalidConfig(
                "cannot fit an ensemble on an empty matrix".to_string(),
            ));
        }

        let n = x.nrows();
        let (n_estimators, params, bootstrap, mode) = self.settings(x.ncols());
        let ones = vec![1.0; n];
        let base_weights = class_weights(y, &ones, mode);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trees = Vec::with_capacity(n_estimators);
        for _ in 0..n_estimators {
            let mut tree_rng = StdRng::seed_from_u64(rng.gen::<u64>());

            let counts = if bootstrap {
                let mut counts = vec![0.0; n];
                for _ in 0..n {
                    counts[tree_rng.gen_range(0..n)] += 1.0;
                }
                counts
            } else {
                ones.clone()
            };

            let cw = if mode == ClassWeight::BalancedSubsample {
                class_weights(y, &counts, mode)
            } else {
                base_weights
            };
            let weights: Vec<f64> = counts
                .iter()
                .zip(y.iter())
                .map(|(&c, &label)| c * cw[label as usize])
                .collect();

            trees.push(DecisionTree::fit(x, y, &weights, &params, &mut tree_rng));
        }

        log::trace!(
            "fitted {} with {} trees on {} samples x {} features",
            self.model_type.name(),
            trees.len(),
            n,
            x.ncols()
        );

        self.trees = trees;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Vec<f64> {
        assert!(!self.trees.is_empty(), "predict_proba called before fit");
        let n_trees = self.trees.len() as f64;
        x.rows()
            .into_iter()
            .map(|row| {
                self.trees
                    .iter()
                    .map(|t| t.predict_proba_row(row))
                    .sum::<f64>()
                    / n_trees
            })
            .collect()
    }

    /// Mean of the per-tree importances over trees that split at least
    /// once, renormalised to sum 1.
    fn feature_importances(&self) -> Vec<f64> {
        let mut mean = vec![0.0; self.n_features];
        let split_trees: Vec<&DecisionTree> =
            self.trees.iter().filter(|t| t.node_count() > 1).collect();
        if split_trees.is_empty() {
            return mean;
        }
        for tree in &split_trees {
            for (m, v) in mean.iter_mut().zip(tree.feature_importances()) {
                *m += v;
            }
        }
        let total: f64 = mean.iter().sum();
        if total > 0.0 {
            mean.iter_mut().for_each(|m| *m /= total);
        }
        mean
    }

    fn name(&self) -> &str {
        self.model_type.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MaxFeatures;
    use ndarray::Array2;

    fn small_forest(n: usize) -> ModelType {
        ModelType::default().with_n_estimators(n)
    }

    fn toy_data() -> (Array2<f64>, Vec<u8>) {
        // Column 0 carries the signal, column 1 is noise in a fixed pattern.
        let n = 40;
        let mut data = Vec::with_capacity(n * 2);
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let label = u8::from(i % 4 == 0);
            data.push(label as f64 * 2.0 + (i % 3) as f64 * 0.1);
            data.push(((i * 7) % 5) as f64);
            y.push(label);
        }
        (Array2::from_shape_vec((n, 2), data).unwrap(), y)
    }

    #[test]
    fn balanced_weights_equalise_class_totals() {
        let y = [0, 0, 0, 1];
        let w = class_weights(&y, &[1.0; 4], ClassWeight::Balanced);
        assert!((w[0] * 3.0 - w[1] * 1.0).abs() < 1e-12);
        assert!((w[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((w[1] - 2.0).abs() < 1e-12);
        assert_eq!(class_weights(&y, &[1.0; 4], ClassWeight::Uniform), [1.0, 1.0]);
    }

    #[test]
    fn probabilities_in_unit_interval() {
        let (x, y) = toy_data();
        let mut rf = ForestClassifier::new(small_forest(15), 42);
        rf.fit(x.view(), &y).unwrap();
        let proba = rf.predict_proba(x.view());
        assert_eq!(proba.len(), y.len());
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn signal_feature_dominates_importance() {
        let (x, y) = toy_data();
        let model = ModelType::RandomForest {
            n_estimators: 25,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            class_weight: ClassWeight::Balanced,
        };
        let mut rf = ForestClassifier::new(model, 1);
        rf.fit(x.view(), &y).unwrap();
        let fi = rf.feature_importances();
        assert!((fi.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(fi[0] > fi[1]);
    }

    #[test]
    fn same_seed_same_model() {
        let (x, y) = toy_data();
        let mut a = ForestClassifier::new(small_forest(10), 9);
        let mut b = ForestClassifier::new(small_forest(10), 9);
        a.fit(x.view(), &y).unwrap();
        b.fit(x.view(), &y).unwrap();
        assert_eq!(a.predict_proba(x.view()), b.predict_proba(x.view()));
        assert_eq!(a.feature_importances(), b.feature_importances());
    }

    #[test]
    fn extra_trees_fit_and_predict() {
        let (x, y) = toy_data();
        let model: ModelType = "extra_trees".parse().unwrap();
        let mut et = ForestClassifier::new(model.with_n_estimators(10), 5);
        et.fit(x.view(), &y).unwrap();
        let predictions = et.predict(x.view());
        let correct = predictions.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct >= 36, "only {} of 40 correct", correct);
    }

    #[test]
    #[should_panic(expected = "predict_proba called before fit")]
    fn unfitted_forest_panics_on_predict() {
        let (x, _) = toy_data();
        ForestClassifier::new(small_forest(2), 0).predict_proba(x.view());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let (x, _) = toy_data();
        let mut rf = ForestClassifier::new(small_forest(2), 0);
        assert!(rf.fit(x.view(), &[0, 1]).is_err());
    }
}
