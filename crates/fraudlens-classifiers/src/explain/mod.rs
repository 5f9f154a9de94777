//! Feature attribution for fitted tree ensembles.
//!
//! `TreeExplainer` computes exact path-dependent TreeSHAP values. Results come
//! back as `AttributionValues`, which callers resolve to the fraud-class
//! matrix with `positive_class`.
pub mod tree_shap;

pub use tree_shap::TreeExplainer;

use anyhow::{bail, Result};
use ndarray::{Array2, Axis};

use crate::error::ClassifierError;

/// Attribution output: either one matrix for the modelled output, or one
/// matrix per class (`[legitimate, fraud]`). Rows are samples, columns are
/// features.
#[derive(Debug, Clone)]
pub enum AttributionValues {
    SingleMatrix(Array2<f64>),
    PerClassList(Vec<Array2<f64>>),
}

impl AttributionValues {
    /// The attribution matrix for the fraud class.
    pub fn positive_class(self) -> Result<Array2<f64>> {
        match self {
            AttributionValues::SingleMatrix(values) => Ok(values),
            AttributionValues::PerClassList(mut per_class) => {
                if per_class.len() < 2 {
                    bail!(ClassifierError::InvalidParameter(format!(
                        "expected attribution values for 2 classes, got {}",
                        per_class.len()
                    )));
                }
                Ok(per_class.swap_remove(1))
            }
        }
    }

    pub fn n_classes(&self) -> usize {
        match self {
            AttributionValues::SingleMatrix(_) => 1,
            AttributionValues::PerClassList(per_class) => per_class.len(),
        }
    }
}

/// Mean absolute attribution of one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureImportance {
    pub index: usize,
    pub name: String,
    pub mean_abs: f64,
}

/// Rank features by mean |attribution| over rows, most important first.
/// Ties keep column order.
pub fn mean_abs_importance(
    values: &Array2<f64>,
    feature_names: &[String],
) -> Result<Vec<FeatureImportance>> {
    if values.ncols() != feature_names.len() {
        bail!(ClassifierError::LengthMismatch {
            what: "feature names",
            expected: values.ncols(),
            actual: feature_names.len(),
        });
    }
    if values.nrows() == 0 {
        bail!(ClassifierError::EmptyInput("attribution matrix"));
    }

    let means = values.mapv(f64::abs).mean_axis(Axis(0));
    let mut ranked: Vec<FeatureImportance> = feature_names
        .iter()
        .enumerate()
        .map(|(index, name)| FeatureImportance {
            index,
            name: name.clone(),
            mean_abs: means.as_ref().map_or(0.0, |m| m[index]),
        })
        .collect();
    ranked.sort_by(|a, b| b.mean_abs.total_cmp(&a.mean_abs));
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_class_list_selects_fraud_matrix() {
        let legit = Array2::from_elem((2, 3), -1.0);
        let fraud = Array2::from_elem((2, 3), 1.0);
        let values = AttributionValues::PerClassList(vec![legit, fraud.clone()]);
        assert_eq!(values.n_classes(), 2);
        assert_eq!(values.positive_class().unwrap(), fraud);
    }

    #[test]
    fn single_matrix_is_returned_as_is() {
        let m = Array2::from_elem((1, 2), 0.25);
        assert_eq!(AttributionValues::SingleMatrix(m.clone()).positive_class().unwrap(), m);
    }

    #[test]
    fn short_per_class_list_errors() {
        let values = AttributionValues::PerClassList(vec![Array2::zeros((1, 1))]);
        assert!(values.positive_class().is_err());
    }

    #[test]
    fn importance_ranks_by_mean_abs() {
        let values = Array2::from_shape_vec((2, 3), vec![0.1, -2.0, 0.5, -0.1, 1.0, -0.5]).unwrap();
        let names: Vec<String> = ["V1", "V2", "V3"].iter().map(|s| s.to_string()).collect();
        let ranked = mean_abs_importance(&values, &names).unwrap();
        let order: Vec<&str> = ranked.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(order, vec!["V2", "V3", "V1"]);
        assert!((ranked[0].mean_abs - 1.5).abs() < 1e-12);
    }
}
