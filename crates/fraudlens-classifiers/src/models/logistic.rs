use anyhow::{bail, Result};
use ndarray::{concatenate, Array1, Array2, Axis};

use crate::config::ModelType;
use crate::error::ClassifierError;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::utils::{check_fit_input, sample_weights, sigmoid};

/// L2-regularized logistic regression fitted with Newton-Raphson (IRLS).
///
/// Minimizes `0.5 * ||w||^2 + C * sum_i s_i * logloss_i`, where `s_i` are
/// the per-sample class weights. The intercept is not penalized.
pub struct LogisticRegressionClassifier {
    c: f64,
    max_iter: usize,
    tol: f64,
    balanced: bool,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    n_iter: usize,
}

impl LogisticRegressionClassifier {
    pub fn new(model_type: &ModelType) -> Result<Self> {
        match model_type {
            ModelType::LogisticRegression {
                c,
                max_iter,
                tol,
                balanced,
            } => {
                if !(*c > 0.0) {
                    bail!(ClassifierError::InvalidParameter(format!(
                        "logistic regression C must be positive, got {}",
                        c
                    )));
                }
                Ok(LogisticRegressionClassifier {
                    c: *c,
                    max_iter: *max_iter,
                    tol: *tol,
                    balanced: *balanced,
                    coefficients: None,
                    intercept: 0.0,
                    n_iter: 0,
                })
            }
            other => bail!(ClassifierError::InvalidParameter(format!(
                "expected LogisticRegression params, got {}",
                other.kind()
            ))),
        }
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Number of Newton iterations used by the last fit.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Signed distance to the separating hyperplane (log-odds).
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let w = self
            .coefficients
            .as_ref()
            .ok_or(ClassifierError::NotFitted("LogisticRegressionClassifier"))?;
        if x.ncols() != w.len() {
            bail!(ClassifierError::LengthMismatch {
                what: "feature columns",
                expected: w.len(),
                actual: x.ncols(),
            });
        }
        Ok(x.dot(w) + self.intercept)
    }

    fn objective(&self, z: &Array2<f64>, y: &[u8], s: &[f64], beta: &Array1<f64>) -> f64 {
        let p = beta.len() - 1;
        let margins = z.dot(beta);
        let loss: f64 = margins
            .iter()
            .zip(y.iter().zip(s.iter()))
            .map(|(&m, (&label, &weight))| weight * (softplus(m) - label as f64 * m))
            .sum();
        let penalty: f64 = beta.iter().take(p).map(|b| b * b).sum::<f64>() * 0.5;
        penalty + self.c * loss
    }
}

impl ClassifierModel for LogisticRegressionClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[u8]) -> Result<()> {
        let counts = check_fit_input(x, y)?;
        let s = sample_weights(y, &counts, self.balanced);
        let (n, p) = x.dim();

        // Augment with a constant column for the intercept.
        let z = concatenate![Axis(1), x.view(), Array2::ones((n, 1)).view()];
        let yf = Array1::from_iter(y.iter().map(|&v| v as f64));
        let sw = Array1::from_vec(s.clone());
        let mut penalty = Array1::ones(p + 1);
        penalty[p] = 0.0;

        let mut beta = Array1::<f64>::zeros(p + 1);
        let mut current = self.objective(&z, y, &s, &beta);
        let mut converged = false;
        self.n_iter = 0;

        for iter in 0..self.max_iter {
            self.n_iter = iter + 1;
            let prob = z.dot(&beta).mapv(sigmoid);
            let residual = (&prob - &yf) * &sw;
            let gradient = z.t().dot(&residual) * self.c + &penalty * &beta;

            let curvature = (&prob * &prob.mapv(|q| 1.0 - q)) * &sw * self.c;
            let weighted = &z * &curvature.view().insert_axis(Axis(1));
            let mut hessian = z.t().dot(&weighted);
            for i in 0..=p {
                hessian[(i, i)] += penalty[i] + 1e-10;
            }

            let step = cholesky_solve(&hessian, &gradient)?;

            // Backtracking keeps Newton steps from overshooting on
            // near-separable data.
            let mut t = 1.0;
            let mut candidate = &beta - &(&step * t);
            let mut value = self.objective(&z, y, &s, &candidate);
            while value > current && t > 1e-8 {
                t *= 0.5;
                candidate = &beta - &(&step * t);
                value = self.objective(&z, y, &s, &candidate);
            }

            let max_change = step.iter().fold(0.0f64, |acc, v| acc.max((v * t).abs()));
            beta = candidate;
            current = value;

            log::trace!(
                "logistic regression iter {}: objective {:.6}, max step {:.3e}",
                iter,
                current,
                max_change
            );
            if max_change < self.tol {
                converged = true;
                break;
            }
        }

        if !converged {
            log::warn!(
                "Logistic regression did not converge in {} iterations",
                self.max_iter
            );
        }

        self.intercept = beta[p];
        self.coefficients = Some(beta.slice(ndarray::s![..p]).to_owned());
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid).to_vec())
    }

    fn name(&self) -> &str {
        "logistic_regression"
    }
}

fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

/// Solve `a * x = b` for a symmetric positive definite `a`.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[(i, j)];
            for k in 0..j {
                sum -= l[(i, k)] * l[(j, k)];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    bail!("Hessian is not positive definite (pivot {} = {})", i, sum);
                }
                l[(i, i)] = sum.sqrt();
            } else {
                l[(i, j)] = sum / l[(j, j)];
            }
        }
    }

    let mut forward = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[(i, k)] * forward[k];
        }
        forward[i] = sum / l[(i, i)];
    }

    let mut solution = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = forward[i];
        for k in (i + 1)..n {
            sum -= l[(k, i)] * solution[k];
        }
        solution[i] = sum / l[(i, i)];
    }
    Ok(solution)
}
