use anyhow::{Context, Result};

use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::forest::RandomForestClassifier;
use crate::models::gbdt::GBDTClassifier;
use crate::models::logistic::LogisticRegressionClassifier;
use crate::models::stacking::StackingClassifier;
use crate::models::svm::SVMClassifier;

/// Build an unfitted boxed classifier from a `ModelConfig`.
pub fn build_model(params: &ModelConfig) -> Result<Box<dyn ClassifierModel>> {
    build_model_type(&params.model_type)
        .with_context(|| format!("Failed to build model '{}'", params.name))
}

/// Build an unfitted boxed classifier from bare hyper-parameters.
pub fn build_model_type(model_type: &ModelType) -> Result<Box<dyn ClassifierModel>> {
    Ok(match model_type {
        ModelType::LogisticRegression { .. } => {
            Box::new(LogisticRegressionClassifier::new(model_type)?)
        }
        ModelType::RandomForest { .. } => Box::new(RandomForestClassifier::new(model_type)?),
        ModelType::GBDT { .. } => Box::new(GBDTClassifier::new(model_type)?),
        ModelType::SVM { .. } => Box::new(SVMClassifier::new(model_type)?),
        ModelType::Stacking { .. } => Box::new(StackingClassifier::new(model_type)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_every_default_model() {
        for config in ModelConfig::default_comparison(42) {
            let model = build_model(&config).unwrap();
            assert!(!model.name().is_empty());
        }
        assert_eq!(build_model_type(&ModelType::gbdt()).unwrap().name(), "gbdt");
        assert_eq!(build_model_type(&ModelType::svm()).unwrap().name(), "svm");
    }

    #[test]
    fn invalid_params_carry_model_name() {
        let config = ModelConfig::new(
            "bad lr",
            ModelType::LogisticRegression {
                c: -1.0,
                max_iter: 10,
                tol: 1e-4,
                balanced: false,
            },
        );
        let err = build_model(&config).err().unwrap();
        assert!(format!("{:#}", err).contains("bad lr"));
    }
}
