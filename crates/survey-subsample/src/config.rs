use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Result, SubsampleError};

/// How many candidate features a tree inspects at each split.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
    Count(usize),
}

impl MaxFeatures {
    /// Resolve against the number of columns in the training matrix.
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(k) => *k,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Per-class sample weighting applied before the trees are grown.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// `n_samples / (2 * n_class)` computed on the training partition.
    Balanced,
    /// Same as `Balanced` but recomputed on every bootstrap sample.
    BalancedSubsample,
    Uniform,
}

/// Probability calibration applied on top of the ensemble scores.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMethod {
    #[default]
    Sigmoid,
    Isotonic,
}

impl FromStr for CalibrationMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sigmoid" | "platt" => Ok(CalibrationMethod::Sigmoid),
            "isotonic" => Ok(CalibrationMethod::Isotonic),
            _ => Err(format!("Unknown calibration method: {}", s)),
        }
    }
}

/// Supported ensemble families and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    RandomForest {
        n_estimators: usize,
        max_depth: Option<usize>,
        min_samples_split: usize,
        min_samples_leaf: usize,
        max_features: MaxFeatures,
        bootstrap: bool,
        class_weight: ClassWeight,
    },
    ExtraTrees {
        n_estimators: usize,
        max_depth: Option<usize>,
        min_samples_split: usize,
        min_samples_leaf: usize,
        max_features: MaxFeatures,
        class_weight: ClassWeight,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::RandomForest {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            class_weight: ClassWeight::Balanced,
        }
    }
}

impl ModelType {
    pub fn n_estimators(&self) -> usize {
        match self {
            ModelType::RandomForest { n_estimators, .. }
            | ModelType::ExtraTrees { n_estimators, .. } => *n_estimators,
        }
    }

    /// Same family and settings with a different number of trees.
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        match &mut self {
            ModelType::RandomForest { n_estimators, .. }
            | ModelType::ExtraTrees { n_estimators, .. } => *n_estimators = n,
        }
        self
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelType::RandomForest { .. } => "random_forest",
            ModelType::ExtraTrees { .. } => "extra_trees",
        }
    }

    fn validate(&self) -> Result<()> {
        let (n_estimators, min_samples_split, min_samples_leaf, max_features) = match self {
            ModelType::RandomForest {
                n_estimators,
                min_samples_split,
                min_samples_leaf,
                max_features,
                ..
            }
            | ModelType::ExtraTrees {
                n_estimators,
                min_samples_split,
                min_samples_leaf,
                max_features,
                ..
            } => (*n_estimators, *min_samples_split, *min_samples_leaf, *max_features),
        };
        if n_estimators == 0 {
            return Err(SubsampleError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if min_samples_split < 2 {
            return Err(SubsampleError::InvalidConfig(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if min_samples_leaf == 0 {
            return Err(SubsampleError::InvalidConfig(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if max_features == MaxFeatures::Count(0) {
            return Err(SubsampleError::InvalidConfig(
                "max_features must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "random_forest" | "rf" => Ok(ModelType::default()),
            "extra_trees" => Ok(ModelType::ExtraTrees {
                n_estimators: 100,
                max_depth: None,
                min_samples_split: 2,
                min_samples_leaf: 1,
                max_features: MaxFeatures::Sqrt,
                class_weight: ClassWeight::Balanced,
            }),
            _ => Err(format!("Unknown model type: {}", s)),
        }
    }
}

/// The calibrated ensemble used for every diagnosis.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ModelConfig {
    #[serde(default)]
    pub calibration: CalibrationMethod,

    #[serde(flatten)]
    pub model_type: ModelType,
}

impl ModelConfig {
    pub fn new(calibration: CalibrationMethod, model_type: ModelType) -> Self {
        Self {
            calibration,
            model_type,
        }
    }
}

/// Settings for one nested cross-validated fitting run.
///
/// The same `seed` drives the outer splitter, the inner calibration
/// splitter and the ensemble's own randomness.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FitConfig {
    pub n_splits: usize,
    pub seed: u64,
    pub model: ModelConfig,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            n_splits: 5,
            seed: 42,
            model: ModelConfig::default(),
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_splits < 2 {
            return Err(SubsampleError::InvalidConfig(format!(
                "n_splits must be at least 2, got {}",
                self.n_splits
            )));
        }
        self.model.model_type.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqrt_features_never_drop_below_one() {
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
        assert_eq!(MaxFeatures::Sqrt.resolve(5), 2);
        assert_eq!(MaxFeatures::Sqrt.resolve(100), 10);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
        assert_eq!(MaxFeatures::Count(50).resolve(3), 3);
    }

    #[test]
    fn default_fit_config_is_valid() {
        let cfg = FitConfig::default();
        assert_eq!(cfg.n_splits, 5);
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.model.model_type.n_estimators(), 100);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_single_split() {
        let cfg = FitConfig {
            n_splits: 1,
            ..FitConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SubsampleError::InvalidConfig(_))));
    }

    #[test]
    fn fit_config_reads_partial_json() {
        let json = r#"{
            "n_splits": 3,
            "model": {
                "calibration": "isotonic",
                "ExtraTrees": {
                    "n_estimators": 50,
                    "max_depth": null,
                    "min_samples_split": 2,
                    "min_samples_leaf": 1,
                    "max_features": "sqrt",
                    "class_weight": "balanced"
                }
            }
        }"#;
        let cfg: FitConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.n_splits, 3);
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.model.calibration, CalibrationMethod::Isotonic);
        assert_eq!(cfg.model.model_type.name(), "extra_trees");
        assert_eq!(cfg.model.model_type.n_estimators(), 50);

        let back: FitConfig = serde_json::from_str(&serde_json::to_string(&cfg).unwrap()).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn with_n_estimators_keeps_family() {
        let mt: ModelType = "extra_trees".parse().unwrap();
        let mt = mt.with_n_estimators(7);
        assert_eq!(mt.name(), "extra_trees");
        assert_eq!(mt.n_estimators(), 7);
    }
}
