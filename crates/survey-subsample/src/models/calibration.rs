//! Score-to-probability calibrators: Platt sigmoid and isotonic regression.
use crate::config::CalibrationMethod;

/// Fitted mapping from raw ensemble scores to calibrated probabilities.
#[derive(Debug, Clone, PartialEq)]
pub enum Calibrator {
    /// `p = 1 / (1 + exp(a * score + b))`
    Sigmoid { a: f64, b: f64 },
    /// Non-decreasing step points, linearly interpolated and clipped.
    Isotonic { x: Vec<f64>, y: Vec<f64> },
}

impl Calibrator {
    pub fn fit(method: CalibrationMethod, scores: &[f64], labels: &[u8]) -> Self {
        assert_eq!(scores.len(), labels.len(), "scores and labels must have equal lengths");
        match method {
            CalibrationMethod::Sigmoid => {
                let (a, b) = fit_sigmoid(scores, labels);
                Calibrator::Sigmoid { a, b }
            }
            CalibrationMethod::Isotonic => {
                let (x, y) = fit_isotonic(scores, labels);
                Calibrator::Isotonic { x, y }
            }
        }
    }

    pub fn transform(&self, score: f64) -> f64 {
        let p = match self {
            Calibrator::Sigmoid { a, b } => 1.0 / (1.0 + (a * score + b).exp()),
            Calibrator::Isotonic { x, y } => interpolate(x, y, score),
        };
        p.clamp(0.0, 1.0)
    }
}

/// Platt scaling fitted with Newton's method and backtracking line search.
///
/// Targets are smoothed towards the class priors
/// (`(n_pos + 1) / (n_pos + 2)` and `1 / (n_neg + 2)`) to avoid
/// overfitting on small calibration sets.
fn fit_sigmoid(scores: &[f64], labels: &[u8]) -> (f64, f64) {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    let prior1 = labels.iter().filter(|&&l| l == 1).count() as f64;
    let prior0 = labels.len() as f64 - prior1;
    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = labels
        .iter()
        .map(|&l| if l == 1 { hi_target } else { lo_target })
        .collect();

    let objective = |a: f64, b: f64| -> f64 {
        scores
            .iter()
            .zip(targets.iter())
            .map(|(&f, &t)| {
                let fapb = f * a + b;
                if fapb >= 0.0 {
                    t * fapb + (-fapb).exp().ln_1p()
                } else {
                    (t - 1.0) * fapb + fapb.exp().ln_1p()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    for _ in 0..MAX_ITER {
        let (mut h11, mut h22, mut h21, mut g1, mut g2) = (SIGMA, SIGMA, 0.0, 0.0, 0.0);
        for (&f, &t) in scores.iter().zip(targets.iter()) {
            let fapb = f * a + b;
            let (p, q) = if fapb >= 0.0 {
                let e = (-fapb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = fapb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = t - p;
            g1 += f * d1;
            g2 += d1;
        }

        if g1.abs() < EPS && g2.abs() < EPS {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        let mut accepted = false;
        while step >= MIN_STEP {
            let new_a = a + step * da;
            let new_b = b + step * db;
            let new_f = objective(new_a, new_b);
            if new_f < fval + 1e-4 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                accepted = true;
                break;
            }
            step /= 2.0;
        }
        if !accepted {
            log::trace!("sigmoid calibration line search stalled at a={}, b={}", a, b);
            break;
        }
    }

    (a, b)
}

/// Pool-adjacent-violators on (score, label) pairs; equal scores are
/// merged into one weighted block first.
fn fit_isotonic(scores: &[f64], labels: &[u8]) -> (Vec<f64>, Vec<f64>) {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&i, &j| scores[i].total_cmp(&scores[j]));

    // (x, mean y, weight)
    let mut points: Vec<(f64, f64, f64)> = Vec::new();
    for &i in &order {
        let (x, y) = (scores[i], labels[i] as f64);
        match points.last_mut() {
            Some(last) if last.0 == x => {
                last.1 = (last.1 * last.2 + y) / (last.2 + 1.0);
                last.2 += 1.0;
            }
            _ => points.push((x, y, 1.0)),
        }
    }

    // Blocks of (value, weight, first point, last point)
    let mut blocks: Vec<(f64, f64, usize, usize)> = Vec::with_capacity(points.len());
    for (idx, &(_, y, w)) in points.iter().enumerate() {
        blocks.push((y, w, idx, idx));
        while blocks.len() > 1 {
            let n = blocks.len();
            if blocks[n - 2].0 <= blocks[n - 1].0 {
                break;
            }
            let (v2, w2, _, end) = blocks[n - 1];
            let (v1, w1, start, _) = blocks[n - 2];
            blocks.truncate(n - 2);
            blocks.push(((v1 * w1 + v2 * w2) / (w1 + w2), w1 + w2, start, end));
        }
    }

    let mut fitted = vec![0.0; points.len()];
    for &(value, _, start, end) in &blocks {
        fitted[start..=end].iter_mut().for_each(|v| *v = value);
    }
    let xs = points.iter().map(|p| p.0).collect();
    (xs, fitted)
}

fn interpolate(x: &[f64], y: &[f64], value: f64) -> f64 {
    if x.is_empty() {
        return 0.5;
    }
    if value <= x[0] {
        return y[0];
    }
    let last = x.len() - 1;
    if value >= x[last] {
        return y[last];
    }
    let hi = x.partition_point(|&v| v <= value);
    let lo = hi - 1;
    let span = x[hi] - x[lo];
    if span <= 0.0 {
        return y[lo];
    }
    y[lo] + (value - x[lo]) / span * (y[hi] - y[lo])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_increasing_for_informative_scores() {
        let scores = [0.1, 0.2, 0.3, 0.4, 0.6, 0.7, 0.8, 0.9];
        let labels = [0, 0, 0, 1, 0, 1, 1, 1];
        let cal = Calibrator::fit(CalibrationMethod::Sigmoid, &scores, &labels);
        match cal {
            Calibrator::Sigmoid { a, .. } => assert!(a < 0.0, "slope {} should be negative", a),
            _ => unreachable!(),
        }
        assert!(cal.transform(0.9) > cal.transform(0.1));
        assert!((0.0..=1.0).contains(&cal.transform(100.0)));
        assert!((0.0..=1.0).contains(&cal.transform(-100.0)));
    }

    #[test]
    fn sigmoid_without_signal_tracks_prior() {
        let scores = [0.5; 10];
        let labels = [1, 0, 1, 0, 1, 0, 1, 0, 1, 0];
        let cal = Calibrator::fit(CalibrationMethod::Sigmoid, &scores, &labels);
        assert!((cal.transform(0.5) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn isotonic_pools_violators() {
        let scores = [0.1, 0.2, 0.3, 0.4];
        let labels = [0, 1, 0, 1];
        let cal = Calibrator::fit(CalibrationMethod::Isotonic, &scores, &labels);
        match &cal {
            Calibrator::Isotonic { y, .. } => assert_eq!(y, &vec![0.0, 0.5, 0.5, 1.0]),
            _ => unreachable!(),
        }
        assert_eq!(cal.transform(0.0), 0.0);
        assert_eq!(cal.transform(1.0), 1.0);
        assert!((cal.transform(0.25) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn isotonic_output_is_monotone() {
        let scores = [0.9, 0.1, 0.5, 0.5, 0.3, 0.7, 0.2, 0.8];
        let labels = [1, 0, 1, 0, 1, 0, 0, 1];
        let cal = Calibrator::fit(CalibrationMethod::Isotonic, &scores, &labels);
        let grid: Vec<f64> = (0..=20).map(|i| cal.transform(i as f64 / 20.0)).collect();
        assert!(grid.windows(2).all(|w| w[0] <= w[1]));
    }
}
