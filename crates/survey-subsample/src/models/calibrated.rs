use ndarray::{ArrayView2, Axis};

use crate::config::{CalibrationMethod, ModelType};
use crate::cross_validation::StratifiedKFold;
use crate::error::Result;
use crate::models::calibration::Calibrator;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::factory::build_model;

/// One ensemble fitted on an inner-training split plus the calibrator fitted
/// on its held-out scores.
pub struct CalibratedMember {
    pub model: Box<dyn ClassifierModel>,
    pub calibrator: Calibrator,
}

/// Cross-validated calibration wrapper.
///
/// `fit` splits the training data with the inner splitter, fits a fresh
/// ensemble per inner fold and calibrates it on that fold's held-out part.
/// Predictions average the calibrated probabilities of all members.
pub struct CalibratedClassifier {
    model_type: ModelType,
    method: CalibrationMethod,
    cv: StratifiedKFold,
    seed: u64,
    members: Vec<CalibratedMember>,
}

impl CalibratedClassifier {
    pub fn new(model_type: ModelType, method: CalibrationMethod, cv: StratifiedKFold, seed: u64) -> Self {
        CalibratedClassifier {
            model_type,
            method,
            cv,
            seed,
            members: Vec::new(),
        }
    }

    pub fn members(&self) -> &[CalibratedMember] {
        &self.members
    }

    /// Feature importances of every member's ensemble, in inner-fold order.
    pub fn member_importances(&self) -> Vec<Vec<f64>> {
        self.members
            .iter()
            .map(|m| m.model.feature_importances())
            .collect()
    }
}

impl ClassifierModel for CalibratedClassifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[u8]) -> Result<()> {
        let folds = self.cv.split(y)?;
        let mut members = Vec::with_capacity(folds.len());

        for (i, fold) in folds.iter().enumerate() {
            let x_train = x.select(Axis(0), &fold.train);
            let y_train: Vec<u8> = fold.train.iter().map(|&j| y[j]).collect();
            let x_calib = x.select(Axis(0), &fold.test);
            let y_calib: Vec<u8> = fold.test.iter().map(|&j| y[j]).collect();

            let mut model = build_model(&self.model_type, self.seed);
            model.fit(x_train.view(), &y_train)?;

            let scores = model.predict_proba(x_calib.view());
            let calibrator = Calibrator::fit(self.method, &scores, &y_calib);
            log::trace!("inner fold {}: calibrator {:?}", i, calibrator);

            members.push(CalibratedMember { model, calibrator });
        }

        self.members = members;
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Vec<f64> {
        assert!(!self.members.is_empty(), "predict_proba called before fit");
        let mut proba = vec![0.0; x.nrows()];
        for member in &self.members {
            let scores = member.model.predict_proba(x);
            for (p, s) in proba.iter_mut().zip(scores) {
                *p += member.calibrator.transform(s);
            }
        }
        let n = self.members.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }

    /// Mean of the member importances.
    fn feature_importances(&self) -> Vec<f64> {
        let per_member = self.member_importances();
        let n_features = per_member.first().map_or(0, |v| v.len());
        let mut mean = vec![0.0; n_features];
        for fi in &per_member {
            for (m, v) in mean.iter_mut().zip(fi) {
                *m += v;
            }
        }
        let n = per_member.len().max(1) as f64;
        mean.iter_mut().for_each(|m| *m /= n);
        mean
    }

    fn name(&self) -> &str {
        "calibrated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn data() -> (Array2<f64>, Vec<u8>) {
        let n = 60;
        let mut values = Vec::with_capacity(n * 3);
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let label = u8::from(i % 3 == 0);
            values.push(label as f64 + (i % 7) as f64 * 0.05);
            values.push((i % 5) as f64);
            values.push(((i * 11) % 13) as f64);
            y.push(label);
        }
        (Array2::from_shape_vec((n, 3), values).unwrap(), y)
    }

    fn classifier(method: CalibrationMethod) -> CalibratedClassifier {
        CalibratedClassifier::new(
            ModelType::default().with_n_estimators(10),
            method,
            StratifiedKFold::new(3, 42),
            42,
        )
    }

    #[test]
    fn one_member_per_inner_fold() {
        let (x, y) = data();
        let mut clf = classifier(CalibrationMethod::Sigmoid);
        clf.fit(x.view(), &y).unwrap();
        assert_eq!(clf.members().len(), 3);
        let fis = clf.member_importances();
        assert_eq!(fis.len(), 3);
        for fi in &fis {
            assert_eq!(fi.len(), 3);
            assert!((fi.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn calibrated_probabilities_are_valid() {
        let (x, y) = data();
        for method in [CalibrationMethod::Sigmoid, CalibrationMethod::Isotonic] {
            let mut clf = classifier(method);
            clf.fit(x.view(), &y).unwrap();
            let proba = clf.predict_proba(x.view());
            assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
            let predicted = clf.predict(x.view());
            let correct = predicted.iter().zip(&y).filter(|(p, t)| p == t).count();
            assert!(correct as f64 / y.len() as f64 > 0.9);
        }
    }

    #[test]
    #[should_panic(expected = "predict_proba called before fit")]
    fn unfitted_classifier_panics_on_predict() {
        let (x, _) = data();
        classifier(CalibrationMethod::Sigmoid).predict_proba(x.view());
    }

    #[test]
    fn inner_split_failure_propagates() {
        let (x, mut y) = data();
        y.iter_mut().for_each(|v| *v = 0);
        y[0] = 1;
        let mut clf = classifier(CalibrationMethod::Sigmoid);
        assert!(clf.fit(x.view(), &y).is_err());
    }
}
