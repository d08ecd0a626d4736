use crate::config::ModelType;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::forest::ForestClassifier;

/// Build an unfitted ensemble for the configured family.
pub fn build_model(model_type: &ModelType, seed: u64) -> Box<dyn ClassifierModel> {
    match model_type {
        ModelType::RandomForest { .. } | ModelType::ExtraTrees { .. } => {
            Box::new(ForestClassifier::new(model_type.clone(), seed))
        }
    }
}
