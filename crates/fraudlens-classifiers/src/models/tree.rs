//! Weighted CART classification tree with Gini impurity.
//!
//! Trees are stored as a flat node array so the random forest and the
//! attribution explainer can walk them without recursion through `Box`es.
use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::ClassifierError;

/// A single node. Internal nodes route `x[feature] <= threshold` to `left`.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Split feature; `None` for leaves.
    pub feature: Option<usize>,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
    /// Weighted fraction of fraud samples reaching this node.
    pub value: f64,
    /// Total sample weight reaching this node.
    pub cover: f64,
}

impl TreeNode {
    fn leaf(value: f64, cover: f64) -> Self {
        TreeNode {
            feature: None,
            threshold: 0.0,
            left: 0,
            right: 0,
            value,
            cover,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature.is_none()
    }
}

/// Growth limits for a tree.
#[derive(Debug, Clone)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Number of features examined per split.
    pub max_features: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: usize::MAX,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    n_features: usize,
}

struct Split {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

struct Builder<'a> {
    x: &'a Array2<f64>,
    y: &'a [u8],
    weights: &'a [f64],
    params: &'a TreeParams,
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Grow a tree on the rows with positive weight.
    ///
    /// `weights` carries both class weighting and bootstrap multiplicities.
    pub fn fit(
        x: &Array2<f64>,
        y: &[u8],
        weights: &[f64],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Result<Self> {
        if x.nrows() != y.len() {
            bail!(ClassifierError::LengthMismatch {
                what: "labels",
                expected: x.nrows(),
                actual: y.len(),
            });
        }
        if x.nrows() != weights.len() {
            bail!(ClassifierError::LengthMismatch {
                what: "sample weights",
                expected: x.nrows(),
                actual: weights.len(),
            });
        }
        let samples: Vec<usize> = (0..x.nrows()).filter(|&i| weights[i] > 0.0).collect();
        if samples.is_empty() || x.ncols() == 0 {
            bail!(ClassifierError::EmptyInput("tree training rows"));
        }

        let mut builder = Builder {
            x,
            y,
            weights,
            params,
            nodes: Vec::new(),
        };
        builder.grow(samples, 0, rng);
        Ok(DecisionTree {
            nodes: builder.nodes,
            n_features: x.ncols(),
        })
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            let node = &nodes[idx];
            if node.is_leaf() {
                0
            } else {
                1 + walk(nodes, node.left).max(walk(nodes, node.right))
            }
        }
        walk(&self.nodes, 0)
    }

    /// Fraud probability of the leaf that `row` falls into.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            let node = &self.nodes[idx];
            match node.feature {
                None => return node.value,
                Some(f) => {
                    idx = if row[f] <= node.threshold {
                        node.left
                    } else {
                        node.right
                    };
                }
            }
        }
    }
}

fn gini(w0: f64, w1: f64) -> f64 {
    let total = w0 + w1;
    if total <= 0.0 {
        return 0.0;
    }
    let p = w1 / total;
    2.0 * p * (1.0 - p)
}

impl<'a> Builder<'a> {
    fn class_weights(&self, samples: &[usize]) -> (f64, f64) {
        samples.iter().fold((0.0, 0.0), |(w0, w1), &i| {
            if self.y[i] == 1 {
                (w0, w1 + self.weights[i])
            } else {
                (w0 + self.weights[i], w1)
            }
        })
    }

    /// Append the subtree for `samples` and return its root index.
    fn grow(&mut self, samples: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let (w0, w1) = self.class_weights(&samples);
        let cover = w0 + w1;
        let value = if cover > 0.0 { w1 / cover } else { 0.0 };
        let idx = self.nodes.len();
        self.nodes.push(TreeNode::leaf(value, cover));

        let params = self.params;
        let at_max_depth = params.max_depth.map_or(false, |d| depth >= d);
        if at_max_depth
            || w0 <= 0.0
            || w1 <= 0.0
            || samples.len() < params.min_samples_split
            || samples.len() < 2 * params.min_samples_leaf
        {
            return idx;
        }

        let split = match self.best_split(&samples, gini(w0, w1) * cover, rng) {
            Some(split) => split,
            None => return idx,
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.x[(i, split.feature)] <= split.threshold);

        let left_idx = self.grow(left, depth + 1, rng);
        let right_idx = self.grow(right, depth + 1, rng);
        let node = &mut self.nodes[idx];
        node.feature = Some(split.feature);
        node.threshold = split.threshold;
        node.left = left_idx;
        node.right = right_idx;
        idx
    }

    /// Search up to `max_features` non-constant features, visited in random
    /// order, for the split with the lowest weighted child impurity.
    ///
    /// Constant features do not count towards `max_features`. The search
    /// also continues past `max_features` while none of the features visited
    /// so far gives an impurity decrease, so a node only becomes a leaf when
    /// no feature at all can improve it.
    fn best_split(&self, samples: &[usize], parent_impurity: f64, rng: &mut StdRng) -> Option<Split> {
        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(rng);

        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<Split> = None;
        let mut visited = 0;
        let mut order = samples.to_vec();

        for feature in features {
            if visited >= self.params.max_features && best.is_some() {
                break;
            }
            order.sort_by(|&a, &b| self.x[(a, feature)].total_cmp(&self.x[(b, feature)]));
            let first = self.x[(order[0], feature)];
            let last = self.x[(order[order.len() - 1], feature)];
            if first == last {
                continue;
            }
            visited += 1;

            let (total0, total1) = self.class_weights(&order);
            let (mut left0, mut left1) = (0.0, 0.0);
            for pos in 0..order.len() - 1 {
                let i = order[pos];
                if self.y[i] == 1 {
                    left1 += self.weights[i];
                } else {
                    left0 += self.weights[i];
                }
                let n_left = pos + 1;
                let n_right = order.len() - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let here = self.x[(i, feature)];
                let next = self.x[(order[pos + 1], feature)];
                if here == next {
                    continue;
                }

                let (right0, right1) = (total0 - left0, total1 - left1);
                let impurity =
                    gini(left0, left1) * (left0 + left1) + gini(right0, right1) * (right0 + right1);
                if impurity < parent_impurity - 1e-12
                    && best.as_ref().map_or(true, |b| impurity < b.impurity)
                {
                    let mut threshold = here + (next - here) / 2.0;
                    if threshold >= next {
                        threshold = here;
                    }
                    best = Some(Split {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }
        best
    }
}
