use anyhow::{bail, Result};
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::Array2;

use crate::config::ModelType;
use crate::error::ClassifierError;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::utils::check_fit_input;

const LOG_LIKELIHOOD_LOSS: &str = "LogLikelyhood";

/// Gradient Boosting Decision Tree (GBDT) classifier
pub struct GBDTClassifier {
    model: Option<GBDT>,
    model_type: ModelType,
    n_features: usize,
}

impl GBDTClassifier {
    pub fn new(model_type: &ModelType) -> Result<Self> {
        match model_type {
            ModelType::GBDT { loss_type, .. } => {
                // Only the log-likelihood loss yields fraud probabilities.
                if loss_type.as_str() != LOG_LIKELIHOOD_LOSS {
                    bail!(ClassifierError::InvalidParameter(format!(
                        "Unsupported GBDT loss type: {}. Only {} produces probabilities",
                        loss_type, LOG_LIKELIHOOD_LOSS
                    )));
                }
                Ok(GBDTClassifier {
                    model: None,
                    model_type: model_type.clone(),
                    n_features: 0,
                })
            }
            other => bail!(ClassifierError::InvalidParameter(format!(
                "expected GBDT params, got {}",
                other.kind()
            ))),
        }
    }

    fn to_data(x: &Array2<f64>) -> DataVec {
        x.rows()
            .into_iter()
            .map(|row| {
                let features = row.iter().map(|&v| v as f32).collect();
                Data::new_test_data(features, None)
            })
            .collect()
    }
}

impl ClassifierModel for GBDTClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[u8]) -> Result<()> {
        let counts = check_fit_input(x, y)?;
        let feature_size = x.ncols();

        match &self.model_type {
            ModelType::GBDT {
                learning_rate,
                max_depth,
                num_boost_round,
                debug,
                training_optimization_level,
                loss_type,
                scale_pos_weight,
            } => {
                let mut config = Config::new();

                config.set_feature_size(feature_size);
                config.set_shrinkage(*learning_rate);
                config.set_max_depth(*max_depth);
                config.set_iterations(*num_boost_round as usize);
                config.set_debug(*debug);
                config.set_training_optimization_level(*training_optimization_level);
                config.set_loss(loss_type);

                // Fraud rows are up-weighted by negatives / positives unless
                // an explicit weight is configured.
                let pos_weight =
                    scale_pos_weight.unwrap_or(counts[0] as f32 / counts[1] as f32);
                log::debug!("GBDT positive class weight: {:.3}", pos_weight);

                let mut gbdt = GBDT::new(&config);

                let mut train_x = DataVec::with_capacity(x.nrows());
                for (row, &label) in x.rows().into_iter().zip(y.iter()) {
                    let train_row = row.iter().map(|&v| v as f32).collect();
                    let (weight, target) = if label == 1 {
                        (pos_weight, 1.0)
                    } else {
                        (1.0, -1.0)
                    };
                    train_x.push(Data::new_training_data(train_row, weight, target, None));
                }

                gbdt.fit(&mut train_x);

                self.model = Some(gbdt);
                self.n_features = feature_size;
                Ok(())
            }
            other => bail!(ClassifierError::InvalidParameter(format!(
                "expected GBDT params, got {}",
                other.kind()
            ))),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or(ClassifierError::NotFitted("GBDTClassifier"))?;
        if x.ncols() != self.n_features {
            bail!(ClassifierError::LengthMismatch {
                what: "feature columns",
                expected: self.n_features,
                actual: x.ncols(),
            });
        }
        let test_x = Self::to_data(x);
        // With the log-likelihood loss the booster already returns the
        // probability of the +1 (fraud) label.
        let predictions = model.predict(&test_x);
        Ok(predictions
            .into_iter()
            .map(|p| (p as f64).clamp(0.0, 1.0))
            .collect())
    }

    fn name(&self) -> &str {
        "gbdt"
    }
}
