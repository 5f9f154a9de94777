use anyhow::{bail, Result};
use ndarray::Array2;

use crate::data_handling::{class_counts, validate_labels};
use crate::error::ClassifierError;

/// Numerically safe logistic function.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Validate a training matrix and label vector and return the class counts.
///
/// Both classes must be present: every model here is a binary classifier.
pub fn check_fit_input(x: &Array2<f64>, y: &[u8]) -> Result<[usize; 2]> {
    if x.nrows() == 0 || x.ncols() == 0 {
        bail!(ClassifierError::EmptyInput("training matrix"));
    }
    if x.nrows() != y.len() {
        bail!(ClassifierError::LengthMismatch {
            what: "labels",
            expected: x.nrows(),
            actual: y.len(),
        });
    }
    validate_labels(y)?;
    let counts = class_counts(y.iter().copied());
    if counts[0] == 0 {
        bail!(ClassifierError::SingleClass(1));
    }
    if counts[1] == 0 {
        bail!(ClassifierError::SingleClass(0));
    }
    Ok(counts)
}

/// "Balanced" class weights: `n_samples / (2 * n_class)` per class.
pub fn balanced_class_weights(counts: &[usize; 2]) -> [f64; 2] {
    let n = (counts[0] + counts[1]) as f64;
    [
        n / (2.0 * counts[0].max(1) as f64),
        n / (2.0 * counts[1].max(1) as f64),
    ]
}

/// Per-sample weights from optional balanced class weighting.
pub fn sample_weights(y: &[u8], counts: &[usize; 2], balanced: bool) -> Vec<f64> {
    if !balanced {
        return vec![1.0; y.len()];
    }
    let w = balanced_class_weights(counts);
    y.iter().map(|&label| w[label as usize]).collect()
}

/// Threshold class-1 probabilities at 0.5.
pub fn labels_from_proba(proba: &[f64]) -> Vec<u8> {
    proba.iter().map(|&p| u8::from(p > 0.5)).collect()
}
