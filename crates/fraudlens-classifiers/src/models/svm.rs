use anyhow::{anyhow, bail, Result};
use linfa::dataset::Pr;
use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_svm::{Svm, SvmParams};
use ndarray::{Array1, Array2};

use crate::config::ModelType;
use crate::error::ClassifierError;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::utils::{balanced_class_weights, check_fit_input};

/// Support vector classifier with Platt-scaled probability output.
pub struct SVMClassifier {
    model: Option<Svm<f64, Pr>>,
    model_type: ModelType,
    n_features: usize,
}

impl SVMClassifier {
    pub fn new(model_type: &ModelType) -> Result<Self> {
        match model_type {
            ModelType::SVM { kernel, .. } => {
                if !matches!(kernel.as_str(), "linear" | "gauss" | "poly") {
                    bail!(ClassifierError::InvalidParameter(format!(
                        "Unsupported kernel type: {}. Valid options are: linear, gauss, poly",
                        kernel
                    )));
                }
                Ok(SVMClassifier {
                    model: None,
                    model_type: model_type.clone(),
                    n_features: 0,
                })
            }
            other => bail!(ClassifierError::InvalidParameter(format!(
                "expected SVM params, got {}",
                other.kind()
            ))),
        }
    }
}

/// Default Gaussian kernel width: `n_features * var(X)` over all entries.
fn default_gaussian_eps(x: &Array2<f64>) -> f64 {
    let variance = x.var(0.0);
    let eps = x.ncols() as f64 * variance;
    if eps.is_finite() && eps > 0.0 {
        eps
    } else {
        1.0
    }
}

impl ClassifierModel for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[u8]) -> Result<()> {
        let counts = check_fit_input(x, y)?;

        if let ModelType::SVM {
            eps,
            c,
            kernel,
            gaussian_kernel_eps,
            polynomial_kernel_constant,
            polynomial_kernel_degree,
            balanced,
        } = &self.model_type
        {
            // Targets are fraud == true
            let targets = Array1::from_iter(y.iter().map(|&l| l == 1));
            let dataset = Dataset::new(x.to_owned(), targets);

            let (c_pos, c_neg) = if *balanced {
                let w = balanced_class_weights(&counts);
                (c * w[1], c * w[0])
            } else {
                (*c, *c)
            };

            let mut params: SvmParams<f64, Pr> =
                Svm::<f64, Pr>::params().eps(*eps).pos_neg_weights(c_pos, c_neg);

            params = match kernel.as_str() {
                "linear" => params.linear_kernel(),
                "gauss" => {
                    let width = gaussian_kernel_eps.unwrap_or_else(|| default_gaussian_eps(x));
                    log::debug!("SVM gaussian kernel width: {:.4}", width);
                    params.gaussian_kernel(width)
                }
                "poly" => {
                    params.polynomial_kernel(*polynomial_kernel_constant, *polynomial_kernel_degree)
                }
                other => bail!(ClassifierError::InvalidParameter(format!(
                    "Unsupported kernel type: {}",
                    other
                ))),
            };

            let model = <SvmParams<f64, Pr> as Fit<_, _, _>>::fit(&params, &dataset)
                .map_err(|e| anyhow!("SVM training failed: {}", e))?;
            self.model = Some(model);
            self.n_features = x.ncols();
            Ok(())
        } else {
            bail!(ClassifierError::InvalidParameter(format!(
                "expected SVM params, got {}",
                self.model_type.kind()
            )))
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or(ClassifierError::NotFitted("SVMClassifier"))?;
        if x.ncols() != self.n_features {
            bail!(ClassifierError::LengthMismatch {
                what: "feature columns",
                expected: self.n_features,
                actual: x.ncols(),
            });
        }
        let predictions: Array1<Pr> = model.predict(x);
        Ok(predictions.iter().map(|p| **p as f64).collect())
    }

    fn name(&self) -> &str {
        "svm"
    }
}
