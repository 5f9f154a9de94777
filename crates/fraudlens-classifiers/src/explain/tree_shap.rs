//! Exact path-dependent TreeSHAP (Lundberg et al., 2018) over CART trees.
//!
//! Node covers act as the background distribution, so no reference dataset
//! is needed. Attributions for one tree sum to the leaf value minus the
//! cover-weighted mean leaf value.
use anyhow::{bail, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;

use crate::error::ClassifierError;
use crate::explain::AttributionValues;
use crate::models::tree::{DecisionTree, TreeNode};
use crate::models::ClassifierModel;

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

/// Explains the fraud probability of a tree ensemble whose output is the
/// mean of its trees' leaf values.
pub struct TreeExplainer<'a> {
    trees: &'a [DecisionTree],
    n_features: usize,
}

impl<'a> TreeExplainer<'a> {
    pub fn new(trees: &'a [DecisionTree]) -> Result<Self> {
        let first = match trees.first() {
            Some(tree) => tree,
            None => bail!(ClassifierError::EmptyInput("tree ensemble")),
        };
        let n_features = first.n_features();
        if let Some(other) = trees.iter().find(|t| t.n_features() != n_features) {
            bail!(ClassifierError::LengthMismatch {
                what: "tree feature count",
                expected: n_features,
                actual: other.n_features(),
            });
        }
        Ok(TreeExplainer { trees, n_features })
    }

    /// Explainer over a fitted model's trees; errors for models without trees.
    pub fn from_model(model: &'a dyn ClassifierModel) -> Result<Self> {
        match model.trees() {
            Some(trees) => Self::new(trees),
            None => bail!(ClassifierError::InvalidParameter(format!(
                "model '{}' is not a tree ensemble and cannot be explained",
                model.name()
            ))),
        }
    }

    /// Expected output per class, `[legitimate, fraud]`.
    pub fn expected_value(&self) -> [f64; 2] {
        let fraud = self
            .trees
            .iter()
            .map(|t| t.nodes()[0].value)
            .sum::<f64>()
            / self.trees.len() as f64;
        [1.0 - fraud, fraud]
    }

    /// Attributions for every row, as a per-class list `[legitimate, fraud]`.
    pub fn shap_values(&self, x: &Array2<f64>) -> Result<AttributionValues> {
        if x.ncols() != self.n_features {
            bail!(ClassifierError::LengthMismatch {
                what: "feature columns",
                expected: self.n_features,
                actual: x.ncols(),
            });
        }
        let (n, p) = x.dim();
        log::debug!(
            "Computing TreeSHAP values for {} rows over {} trees",
            n,
            self.trees.len()
        );

        let rows: Vec<Array1<f64>> = (0..n)
            .into_par_iter()
            .map(|r| self.explain_row(x.row(r)))
            .collect();

        let mut fraud = Array2::<f64>::zeros((n, p));
        for (r, phi) in rows.into_iter().enumerate() {
            fraud.row_mut(r).assign(&phi);
        }
        // The two class probabilities sum to one, so legitimate-class
        // attributions are the negated fraud attributions.
        let legitimate = fraud.mapv(|v| -v);
        Ok(AttributionValues::PerClassList(vec![legitimate, fraud]))
    }

    /// Fraud-class attributions for one row, averaged over trees.
    pub fn explain_row(&self, row: ArrayView1<f64>) -> Array1<f64> {
        let mut phi = Array1::<f64>::zeros(self.n_features);
        for tree in self.trees {
            recurse(tree.nodes(), 0, row, &mut phi, &[], 0, 1.0, 1.0, None);
        }
        phi / self.trees.len() as f64
    }
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    nodes: &[TreeNode],
    node_idx: usize,
    row: ArrayView1<f64>,
    phi: &mut Array1<f64>,
    parent_path: &[PathElement],
    unique_depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let mut path = parent_path.to_vec();
    let mut unique_depth = unique_depth;
    extend_path(&mut path, unique_depth, zero_fraction, one_fraction, feature);

    let node = &nodes[node_idx];
    let split_feature = match node.feature {
        None => {
            for i in 1..=unique_depth {
                let weight = unwound_path_sum(&path, unique_depth, i);
                let el = path[i];
                if let Some(f) = el.feature {
                    phi[f] += weight * (el.one_fraction - el.zero_fraction) * node.value;
                }
            }
            return;
        }
        Some(f) => f,
    };

    let (hot, cold) = if row[split_feature] <= node.threshold {
        (node.left, node.right)
    } else {
        (node.right, node.left)
    };
    let hot_zero = nodes[hot].cover / node.cover;
    let cold_zero = nodes[cold].cover / node.cover;

    let mut incoming_zero = 1.0;
    let mut incoming_one = 1.0;
    // A feature seen higher up the path is unwound so it is counted once.
    if let Some(k) = (1..=unique_depth).find(|&k| path[k].feature == Some(split_feature)) {
        incoming_zero = path[k].zero_fraction;
        incoming_one = path[k].one_fraction;
        unwind_path(&mut path, unique_depth, k);
        unique_depth -= 1;
    }

    recurse(
        nodes,
        hot,
        row,
        phi,
        &path,
        unique_depth + 1,
        hot_zero * incoming_zero,
        incoming_one,
        Some(split_feature),
    );
    recurse(
        nodes,
        cold,
        row,
        phi,
        &path,
        unique_depth + 1,
        cold_zero * incoming_zero,
        0.0,
        Some(split_feature),
    );
}

fn extend_path(
    path: &mut Vec<PathElement>,
    unique_depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    path.truncate(unique_depth);
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if unique_depth == 0 { 1.0 } else { 0.0 },
    });
    let denom = (unique_depth + 1) as f64;
    for i in (0..unique_depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / denom;
        path[i].pweight = zero_fraction * path[i].pweight * (unique_depth - i) as f64 / denom;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, unique_depth: usize, path_index: usize) {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let denom = (unique_depth + 1) as f64;
    let mut next_one_portion = path[unique_depth].pweight;

    for i in (0..unique_depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion =
                tmp - path[i].pweight * zero_fraction * (unique_depth - i) as f64 / denom;
        } else {
            path[i].pweight = path[i].pweight * denom / (zero_fraction * (unique_depth - i) as f64);
        }
    }

    for i in path_index..unique_depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.truncate(unique_depth);
}

fn unwound_path_sum(path: &[PathElement], unique_depth: usize, path_index: usize) -> f64 {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let denom = (unique_depth + 1) as f64;
    let mut next_one_portion = path[unique_depth].pweight;
    let mut total = 0.0;

    for i in (0..unique_depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion =
                path[i].pweight - tmp * zero_fraction * (unique_depth - i) as f64 / denom;
        } else if zero_fraction != 0.0 {
            total += path[i].pweight / zero_fraction / ((unique_depth - i) as f64 / denom);
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tree::TreeParams;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fit_tree(x: &Array2<f64>, y: &[u8], seed: u64) -> DecisionTree {
        let mut rng = StdRng::seed_from_u64(seed);
        DecisionTree::fit(x, y, &vec![1.0; y.len()], &TreeParams::default(), &mut rng).unwrap()
    }

    #[test]
    fn stump_attribution_matches_hand_calculation() {
        let x = Array2::from_shape_vec((2, 1), vec![0.0, 1.0]).unwrap();
        let trees = vec![fit_tree(&x, &[0, 1], 0)];
        let explainer = TreeExplainer::new(&trees).unwrap();
        assert_eq!(explainer.expected_value(), [0.5, 0.5]);
        let phi = explainer.explain_row(x.row(1));
        assert!((phi[0] - 0.5).abs() < 1e-12);
        let phi = explainer.explain_row(x.row(0));
        assert!((phi[0] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn local_accuracy_holds_for_every_row() {
        let x = Array2::from_shape_vec(
            (8, 3),
            vec![
                0.0, 1.0, 5.0, 1.0, 0.0, 5.0, 0.0, 0.0, 5.0, 1.0, 1.0, 5.0, 2.0, 1.0, 5.0, 2.0,
                0.0, 5.0, 3.0, 1.0, 5.0, 3.0, 0.0, 5.0,
            ],
        )
        .unwrap();
        let y = vec![0, 0, 0, 1, 1, 0, 1, 1];
        let trees = vec![fit_tree(&x, &y, 1), fit_tree(&x, &y, 2)];
        let explainer = TreeExplainer::new(&trees).unwrap();
        let base = explainer.expected_value()[1];

        let values = explainer.shap_values(&x).unwrap().positive_class().unwrap();
        for r in 0..x.nrows() {
            let prediction: f64 =
                trees.iter().map(|t| t.predict_row(x.row(r))).sum::<f64>() / trees.len() as f64;
            let total = base + values.row(r).sum();
            assert!((total - prediction).abs() < 1e-9, "row {}: {} vs {}", r, total, prediction);
            // The constant third column is never split on.
            assert_eq!(values[(r, 2)], 0.0);
        }
    }

    #[test]
    fn per_class_lists_are_mirror_images() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let trees = vec![fit_tree(&x, &[0, 0, 1, 1], 0)];
        let explainer = TreeExplainer::new(&trees).unwrap();
        match explainer.shap_values(&x).unwrap() {
            AttributionValues::PerClassList(per_class) => {
                assert_eq!(per_class.len(), 2);
                assert_eq!(per_class[0], per_class[1].mapv(|v| -v));
            }
            AttributionValues::SingleMatrix(_) => panic!("expected per-class list"),
        }
    }

    #[test]
    fn empty_ensemble_and_wrong_width_error() {
        assert!(TreeExplainer::new(&[]).is_err());
        let x = Array2::from_shape_vec((2, 1), vec![0.0, 1.0]).unwrap();
        let trees = vec![fit_tree(&x, &[0, 1], 0)];
        let explainer = TreeExplainer::new(&trees).unwrap();
        assert!(explainer.shap_values(&Array2::zeros((1, 2))).is_err());
    }
}
