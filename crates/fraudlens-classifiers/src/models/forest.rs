use anyhow::{bail, Result};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::{MaxFeatures, ModelType};
use crate::error::ClassifierError;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::tree::{DecisionTree, TreeParams};
use crate::models::utils::{check_fit_input, sample_weights};

/// Bagged ensemble of CART trees with per-split feature subsampling.
pub struct RandomForestClassifier {
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: MaxFeatures,
    balanced: bool,
    seed: u64,
    trees: Vec<DecisionTree>,
}

impl RandomForestClassifier {
    pub fn new(model_type: &ModelType) -> Result<Self> {
        match model_type {
            ModelType::RandomForest {
                n_estimators,
                max_depth,
                min_samples_split,
                min_samples_leaf,
                max_features,
                balanced,
                seed,
            } => {
                if *n_estimators == 0 {
                    bail!(ClassifierError::InvalidParameter(
                        "random forest needs at least one tree".to_string()
                    ));
                }
                Ok(RandomForestClassifier {
                    n_estimators: *n_estimators,
                    max_depth: *max_depth,
                    min_samples_split: (*min_samples_split).max(2),
                    min_samples_leaf: (*min_samples_leaf).max(1),
                    max_features: *max_features,
                    balanced: *balanced,
                    seed: *seed,
                    trees: Vec::new(),
                })
            }
            other => bail!(ClassifierError::InvalidParameter(format!(
                "expected RandomForest params, got {}",
                other.kind()
            ))),
        }
    }
}

impl ClassifierModel for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[u8]) -> Result<()> {
        let counts = check_fit_input(x, y)?;
        let class_weights = sample_weights(y, &counts, self.balanced);
        let n = x.nrows();
        let params = TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features.resolve(x.ncols()),
        };

        log::debug!(
            "Growing {} trees on {} rows ({} features per split)",
            self.n_estimators,
            n,
            params.max_features
        );

        // Each tree owns its RNG so the forest is identical regardless of
        // how rayon schedules the work.
        let seed = self.seed;
        self.trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                let mut weights = vec![0.0; n];
                for _ in 0..n {
                    weights[rng.gen_range(0..n)] += 1.0;
                }
                for (w, cw) in weights.iter_mut().zip(class_weights.iter()) {
                    *w *= cw;
                }
                DecisionTree::fit(x, y, &weights, &params, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let first = self
            .trees
            .first()
            .ok_or(ClassifierError::NotFitted("RandomForestClassifier"))?;
        if x.ncols() != first.n_features() {
            bail!(ClassifierError::LengthMismatch {
                what: "feature columns",
                expected: first.n_features(),
                actual: x.ncols(),
            });
        }
        let n_trees = self.trees.len() as f64;
        Ok((0..x.nrows())
            .into_par_iter()
            .map(|r| {
                let row = x.row(r);
                self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees
            })
            .collect())
    }

    fn name(&self) -> &str {
        "random_forest"
    }

    fn trees(&self) -> Option<&[DecisionTree]> {
        Some(&self.trees)
    }
}
