use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A named model and its hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModelConfig {
    /// Display name used in console output and the report.
    pub name: String,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// How many candidate features each tree split considers.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
    Fraction(f64),
    Count(usize),
}

impl MaxFeatures {
    /// Resolve to a concrete number of features, at least one.
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Fraction(f) => (f * n_features as f64) as usize,
            MaxFeatures::Count(c) => c,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub enum ModelType {
    LogisticRegression {
        /// Inverse L2 regularization strength.
        c: f64,
        max_iter: usize,
        tol: f64,
        /// Reweight classes inversely to their frequency.
        balanced: bool,
    },
    RandomForest {
        n_estimators: usize,
        max_depth: Option<usize>,
        min_samples_split: usize,
        min_samples_leaf: usize,
        max_features: MaxFeatures,
        balanced: bool,
        seed: u64,
    },
    GBDT {
        learning_rate: f32,
        max_depth: u32,
        num_boost_round: u32,
        debug: bool,
        training_optimization_level: u8,
        loss_type: String,
        /// Weight applied to fraud rows; `None` uses negatives / positives
        /// of the training labels.
        scale_pos_weight: Option<f32>,
    },
    SVM {
        eps: f64,
        c: f64,
        kernel: String,
        /// Gaussian kernel width; `None` uses `n_features * var(X)`.
        gaussian_kernel_eps: Option<f64>,
        polynomial_kernel_constant: f64,
        polynomial_kernel_degree: f64,
        balanced: bool,
    },
    Stacking {
        estimators: Vec<ModelConfig>,
        final_estimator: Box<ModelType>,
        cv: usize,
        passthrough: bool,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::logistic_regression(true)
    }
}

impl ModelType {
    pub fn logistic_regression(balanced: bool) -> Self {
        ModelType::LogisticRegression {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-6,
            balanced,
        }
    }

    pub fn random_forest(seed: u64) -> Self {
        ModelType::RandomForest {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            balanced: true,
            seed,
        }
    }

    pub fn gbdt() -> Self {
        ModelType::GBDT {
            learning_rate: 0.3,
            max_depth: 6,
            num_boost_round: 100,
            debug: false,
            training_optimization_level: 2,
            loss_type: "LogLikelyhood".to_string(),
            scale_pos_weight: None,
        }
    }

    pub fn svm() -> Self {
        ModelType::SVM {
            eps: 1e-3,
            c: 1.0,
            kernel: "gauss".to_string(),
            gaussian_kernel_eps: None,
            polynomial_kernel_constant: 1.0,
            polynomial_kernel_degree: 3.0,
            balanced: true,
        }
    }

    /// Random forest, boosted trees and SVM feeding an unweighted logistic
    /// regression, with the original features passed through.
    pub fn stacking(seed: u64) -> Self {
        ModelType::Stacking {
            estimators: vec![
                ModelConfig::new("rf", ModelType::random_forest(seed)),
                ModelConfig::new("gbdt", ModelType::gbdt()),
                ModelConfig::new("svm", ModelType::svm()),
            ],
            final_estimator: Box::new(ModelType::LogisticRegression {
                c: 1.0,
                max_iter: 100,
                tol: 1e-6,
                balanced: false,
            }),
            cv: 5,
            passthrough: true,
        }
    }

    /// Short identifier used in logs and file names.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelType::LogisticRegression { .. } => "logistic",
            ModelType::RandomForest { .. } => "random_forest",
            ModelType::GBDT { .. } => "gbdt",
            ModelType::SVM { .. } => "svm",
            ModelType::Stacking { .. } => "stacking",
        }
    }

    /// Overwrite every random seed in this model (and nested estimators).
    pub fn set_seed(&mut self, new_seed: u64) {
        match self {
            ModelType::RandomForest { seed, .. } => *seed = new_seed,
            ModelType::Stacking {
                estimators,
                final_estimator,
                ..
            } => {
                for estimator in estimators.iter_mut() {
                    estimator.model_type.set_seed(new_seed);
                }
                final_estimator.set_seed(new_seed);
            }
            _ => {}
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "logistic" | "logistic_regression" | "lr" => Ok(ModelType::logistic_regression(true)),
            "random_forest" | "rf" => Ok(ModelType::random_forest(42)),
            "gbdt" | "gradient_boosting" => Ok(ModelType::gbdt()),
            "svm" => Ok(ModelType::svm()),
            "stacking" | "stack" => Ok(ModelType::stacking(42)),
            _ => Err(format!(
                "Unknown model type: {}. Expected one of: logistic, random_forest, gbdt, svm, stacking",
                s
            )),
        }
    }
}

impl ModelConfig {
    pub fn new(name: &str, model_type: ModelType) -> Self {
        Self {
            name: name.to_string(),
            model_type,
        }
    }

    /// The three models compared by default.
    pub fn default_comparison(seed: u64) -> Vec<ModelConfig> {
        vec![
            ModelConfig::new("Logistic Regression", ModelType::logistic_regression(true)),
            ModelConfig::new("Random Forest", ModelType::random_forest(seed)),
            ModelConfig::new("Stacked Ensemble", ModelType::stacking(seed)),
        ]
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig::new("Logistic Regression", ModelType::default())
    }
}
