//! Feature standardization.
//!
//! Provides a `StandardScaler` for per-column mean/std scaling. The scaler is
//! fitted on one matrix (the training partition) and then applied to any
//! matrix with the same columns.

use anyhow::{bail, Result};
use ndarray::{Array1, Array2, Axis};
use statrs::statistics::Statistics;

use crate::error::ClassifierError;

/// Per-column standard scaler (zero mean, unit population variance).
#[derive(Clone, Debug)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Columns with a standard deviation below this are left unscaled.
    const MIN_STD: f64 = 1e-12;

    /// Fit a scaler from a matrix where rows are samples and columns are
    /// features.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let (nrows, ncols) = x.dim();
        if nrows == 0 || ncols == 0 {
            bail!(ClassifierError::EmptyInput("matrix passed to StandardScaler::fit"));
        }

        let mut mean = Array1::zeros(ncols);
        let mut scale = Array1::ones(ncols);
        for (c, column) in x.axis_iter(Axis(1)).enumerate() {
            mean[c] = column.iter().mean();
            let std = column.iter().population_std_dev();
            if std.is_finite() && std > Self::MIN_STD {
                scale[c] = std;
            } else {
                log::warn!(
                    "Feature column {} has zero variance; it is centered but not scaled",
                    c
                );
            }
        }

        Ok(StandardScaler { mean, scale })
    }

    /// Standardize all rows using the fitted statistics.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            bail!(ClassifierError::LengthMismatch {
                what: "feature columns",
                expected: self.mean.len(),
                actual: x.ncols(),
            });
        }
        Ok((x - &self.mean) / &self.scale)
    }

    pub fn fit_transform(x: &Array2<f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(x)?;
        let transformed = scaler.transform(x)?;
        Ok((scaler, transformed))
    }
}
