use anyhow::{bail, Context, Result};
use ndarray::{concatenate, Array2, Axis};

use crate::config::{ModelConfig, ModelType};
use crate::data_handling::stratified_kfold;
use crate::error::ClassifierError;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::factory::{build_model, build_model_type};
use crate::models::utils::check_fit_input;

/// Stacked generalization over heterogeneous base learners.
///
/// The meta-learner is trained on out-of-fold fraud probabilities of every
/// base learner (optionally with the original features appended); the base
/// learners are then refitted on the full training set for prediction.
pub struct StackingClassifier {
    estimators: Vec<ModelConfig>,
    final_estimator: ModelType,
    cv: usize,
    passthrough: bool,
    fitted_estimators: Vec<Box<dyn ClassifierModel>>,
    meta_model: Option<Box<dyn ClassifierModel>>,
    n_features: usize,
}

impl StackingClassifier {
    pub fn new(model_type: &ModelType) -> Result<Self> {
        match model_type {
            ModelType::Stacking {
                estimators,
                final_estimator,
                cv,
                passthrough,
            } => {
                if estimators.is_empty() {
                    bail!(ClassifierError::InvalidParameter(
                        "stacking needs at least one base estimator".to_string()
                    ));
                }
                if *cv < 2 {
                    bail!(ClassifierError::InvalidParameter(format!(
                        "stacking cv must be at least 2, got {}",
                        cv
                    )));
                }
                Ok(StackingClassifier {
                    estimators: estimators.clone(),
                    final_estimator: (**final_estimator).clone(),
                    cv: *cv,
                    passthrough: *passthrough,
                    fitted_estimators: Vec::new(),
                    meta_model: None,
                    n_features: 0,
                })
            }
            other => bail!(ClassifierError::InvalidParameter(format!(
                "expected Stacking params, got {}",
                other.kind()
            ))),
        }
    }

    /// Base-learner names in meta-feature column order.
    pub fn estimator_names(&self) -> Vec<&str> {
        self.estimators.iter().map(|e| e.name.as_str()).collect()
    }

    fn meta_features(&self, base: Array2<f64>, x: &Array2<f64>) -> Array2<f64> {
        if self.passthrough {
            concatenate![Axis(1), base, x.view()]
        } else {
            base
        }
    }
}

impl ClassifierModel for StackingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[u8]) -> Result<()> {
        check_fit_input(x, y)?;
        let folds = stratified_kfold(y, self.cv)?;
        let n = x.nrows();

        let mut oof = Array2::<f64>::zeros((n, self.estimators.len()));
        for (e, config) in self.estimators.iter().enumerate() {
            log::info!(
                "Stacking: {}-fold out-of-fold predictions for '{}'",
                self.cv,
                config.name
            );
            for (k, fold) in folds.iter().enumerate() {
                let x_train = x.select(Axis(0), &fold.train);
                let y_train: Vec<u8> = fold.train.iter().map(|&i| y[i]).collect();
                let x_test = x.select(Axis(0), &fold.test);

                let mut model = build_model(config)?;
                model.fit(&x_train, &y_train).with_context(|| {
                    format!("Base estimator '{}' failed on fold {}", config.name, k)
                })?;
                let proba = model.predict_proba(&x_test)?;
                for (&row, p) in fold.test.iter().zip(proba) {
                    oof[(row, e)] = p;
                }
            }
        }

        let meta_x = self.meta_features(oof, x);
        let mut meta = build_model_type(&self.final_estimator)?;
        meta.fit(&meta_x, y).context("Final estimator failed")?;

        let mut fitted = Vec::with_capacity(self.estimators.len());
        for config in &self.estimators {
            log::debug!("Stacking: refitting '{}' on all training rows", config.name);
            let mut model = build_model(config)?;
            model.fit(x, y)?;
            fitted.push(model);
        }

        self.fitted_estimators = fitted;
        self.meta_model = Some(meta);
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let meta = self
            .meta_model
            .as_ref()
            .ok_or(ClassifierError::NotFitted("StackingClassifier"))?;
        if x.ncols() != self.n_features {
            bail!(ClassifierError::LengthMismatch {
                what: "feature columns",
                expected: self.n_features,
                actual: x.ncols(),
            });
        }

        let mut base = Array2::<f64>::zeros((x.nrows(), self.fitted_estimators.len()));
        for (e, model) in self.fitted_estimators.iter().enumerate() {
            let proba = model.predict_proba(x)?;
            for (r, p) in proba.into_iter().enumerate() {
                base[(r, e)] = p;
            }
        }
        meta.predict_proba(&self.meta_features(base, x))
    }

    fn name(&self) -> &str {
        "stacking"
    }
}
