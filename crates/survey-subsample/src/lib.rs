//! survey-subsample: find the survey items that best predict a set of diagnoses.
//!
//! The crate fits calibrated tree ensembles under nested stratified
//! cross-validation for every diagnosis, ranks the survey items with two
//! independent importance strategies (plus a fused consensus), and refits
//! the models over progressively shorter prefixes of that ranking to show
//! how much diagnostic power a compact item subset retains.
//!
//! Data loading, pruning, persistence and reporting helpers live next to the
//! core so the command-line driver stays thin.
pub mod config;
pub mod cross_validation;
pub mod data_handling;
pub mod degradation;
pub mod error;
pub mod feature_selection;
pub mod io;
pub mod learner;
pub mod metrics;
pub mod model_fitting;
pub mod models;
pub mod report;
pub mod tables;

pub use config::{CalibrationMethod, FitConfig, MaxFeatures, ModelConfig, ModelType};
pub use degradation::{degrading_fit, feature_subsets, DegradationResult};
pub use error::{Result, SubsampleError};
pub use feature_selection::ranking::{rank_features, FeatureRanking};
pub use model_fitting::{fit_models, FitOutput};
pub use tables::{ImportanceTable, SummaryTable};
