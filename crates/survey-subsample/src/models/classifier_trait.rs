use ndarray::ArrayView2;

use crate::error::Result;

/// Contract for the ensemble family used by the fitting engine.
///
/// Labels use the 0/1 convention (1 = diagnosis present). Implementations
/// must be `Send` so fits can run on the sweep's worker threads.
pub trait ClassifierModel: Send {
    /// Fit the model on rows of `x` with matching labels `y`.
    fn fit(&mut self, x: ArrayView2<f64>, y: &[u8]) -> Result<()>;

    /// Probability of the positive class for every row of `x`.
    ///
    /// # Panics
    ///
    /// Panics if called before a successful [`fit`](Self::fit).
    fn predict_proba(&self, x: ArrayView2<f64>) -> Vec<f64>;

    /// Hard labels; the positive class wins only when strictly more likely.
    fn predict(&self, x: ArrayView2<f64>) -> Vec<u8> {
        self.predict_proba(x)
            .into_iter()
            .map(|p| u8::from(p > 0.5))
            .collect()
    }

    /// Non-negative per-feature importances, one entry per column of `x`.
    fn feature_importances(&self) -> Vec<f64>;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}
