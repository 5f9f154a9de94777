use anyhow::Result;
use ndarray::Array2;

use crate::models::tree::DecisionTree;
use crate::models::utils::labels_from_proba;

/// Common capability set of the binary classifiers compared by the pipeline.
///
/// Labels follow the dataset convention: 0 for legitimate, 1 for fraud.
pub trait ClassifierModel {
    /// Fit the model on a feature matrix and its row-aligned labels.
    fn fit(&mut self, x: &Array2<f64>, y: &[u8]) -> Result<()>;

    /// Probability of the fraud class for each row.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>>;

    /// Hard labels; the default thresholds `predict_proba` at 0.5.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<u8>> {
        Ok(labels_from_proba(&self.predict_proba(x)?))
    }

    /// Human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }

    /// Fitted trees, for models that are tree ensembles we can explain.
    fn trees(&self) -> Option<&[DecisionTree]> {
        None
    }
}
