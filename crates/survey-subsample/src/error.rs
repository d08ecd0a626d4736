use thiserror::Error;

/// Errors surfaced by the fitting, ranking and sweep stages.
///
/// Numeric degeneracies (a diagnosis that cannot be fit, an undefined
/// likelihood ratio) are not errors: they show up as NaN in the result
/// tables so that one bad diagnosis does not abort a batch.
#[derive(Debug, Error)]
pub enum SubsampleError {
    #[error("at least one feature column is required")]
    EmptyFeatures,

    #[error("at least one diagnosis column is required")]
    EmptyDiagnoses,

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("top_n must be between 1 and {available}, got {top_n}")]
    TopNOutOfRange { top_n: usize, available: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("column '{column}' row {row}: expected a 0/1 label, found {value}")]
    NonBinaryLabel {
        column: String,
        row: usize,
        value: f64,
    },

    #[error("column '{column}' row {row}: missing value")]
    MissingValue { column: String, row: usize },

    #[error("class {class} has {count} members, fewer than n_splits={n_splits}")]
    InsufficientClassMembers {
        class: u8,
        count: usize,
        n_splits: usize,
    },

    #[error("shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("degrading fit with {n_features} feature(s) failed: {reason}")]
    WorkerFailure { n_features: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, SubsampleError>;
