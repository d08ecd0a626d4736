use plotly::common::{DashType, Line, Mode};
use plotly::layout::{Axis, Layout};
use plotly::{Bar, Plot, Scatter};

use crate::degradation::DegradationResult;
use crate::feature_selection::ranking::FeatureRanking;
use crate::learner::FittedLearner;

/// Metric drawn by [`plot_degradation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveMetric {
    ValidationAccuracy,
    Sensitivity,
}

impl CurveMetric {
    fn label(&self) -> &'static str {
        match self {
            CurveMetric::ValidationAccuracy => "Validation accuracy",
            CurveMetric::Sensitivity => "Sensitivity",
        }
    }
}

/// Bar chart of the summed importance of the `limit` best features, in
/// aggregate order.
pub fn plot_importance(ranking: &FeatureRanking, limit: usize) -> Plot {
    let features: Vec<String> = ranking.aggregate.iter().take(limit).cloned().collect();
    let scores: Vec<f64> = features
        .iter()
        .map(|f| ranking.aggregate_scores.score(f).unwrap_or(f64::NAN))
        .collect();

    let mut plot = Plot::new();
    plot.add_trace(Bar::new(features, scores).name("Aggregate importance"));
    plot.set_layout(
        Layout::new()
            .title("Aggregate feature importance")
            .x_axis(Axis::new().title("Survey item"))
            .y_axis(Axis::new().title("Summed importance")),
    );
    plot
}

/// One line per diagnosis: `metric` against the number of retained items.
pub fn plot_degradation(result: &DegradationResult, diagnoses: &[String], metric: CurveMetric) -> Plot {
    let mut plot = Plot::new();
    for dx in diagnoses {
        let curve = result.curve(dx);
        let x: Vec<usize> = curve.iter().map(|p| p.0).collect();
        let y: Vec<f64> = curve
            .iter()
            .map(|p| match metric {
                CurveMetric::ValidationAccuracy => p.1,
                CurveMetric::Sensitivity => p.2,
            })
            .collect();
        plot.add_trace(Scatter::new(x, y).mode(Mode::LinesMarkers).name(dx));
    }
    plot.set_layout(
        Layout::new()
            .title(format!("{} vs. number of items", metric.label()).as_str())
            .x_axis(Axis::new().title("Number of items"))
            .y_axis(Axis::new().title(metric.label())),
    );
    plot
}

/// Reliability diagram of the out-of-fold probabilities of each learner.
pub fn plot_calibration(learners: &[FittedLearner], n_bins: usize) -> Plot {
    let mut plot = Plot::new();
    for learner in learners.iter().filter(|l| l.record().is_feasible()) {
        let curve = learner.calibration_curve(n_bins);
        plot.add_trace(
            Scatter::new(curve.mean_predicted, curve.fraction_positive)
                .mode(Mode::LinesMarkers)
                .name(&learner.record().dx),
        );
    }
    plot.add_trace(
        Scatter::new(vec![0.0, 1.0], vec![0.0, 1.0])
            .mode(Mode::Lines)
            .name("Perfectly calibrated")
            .line(Line::new().color("gray").dash(DashType::Dash)),
    );
    plot.set_layout(
        Layout::new()
            .title("Calibration of baseline learners")
            .x_axis(Axis::new().title("Mean predicted probability"))
            .y_axis(Axis::new().title("Fraction of positives")),
    );
    plot
}
