//! Evaluation metrics for binary fraud classifiers.
//!
//! Labels are 0 (legitimate) / 1 (fraud) and scores are fraud probabilities.
use std::fmt;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::data_handling::validate_labels;
use crate::error::ClassifierError;

fn check_lengths(y_true: &[u8], other: usize, what: &'static str) -> Result<()> {
    if y_true.is_empty() {
        bail!(ClassifierError::EmptyInput("label vector"));
    }
    if y_true.len() != other {
        bail!(ClassifierError::LengthMismatch {
            what,
            expected: y_true.len(),
            actual: other,
        });
    }
    Ok(())
}

/// Fraction of predictions equal to the true label.
pub fn accuracy(y_true: &[u8], y_pred: &[u8]) -> Result<f64> {
    check_lengths(y_true, y_pred.len(), "predictions")?;
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Area under the ROC curve via the Mann-Whitney U statistic.
///
/// Tied scores receive their average rank, so a tie between a fraud and a
/// legitimate row counts as half a correct ordering.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Result<f64> {
    check_lengths(y_true, scores.len(), "scores")?;
    validate_labels(y_true)?;
    let n_pos = y_true.iter().filter(|&&l| l == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        bail!(ClassifierError::SingleClass(if n_pos == 0 { 0 } else { 1 }));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1 ..= end share their mean.
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let positives = order[start..end].iter().filter(|&&i| y_true[i] == 1).count();
        rank_sum_pos += avg_rank * positives as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let u = rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0;
    Ok(u / (n_pos * n_neg as f64))
}

/// Points of a receiver operating characteristic curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Decision thresholds, decreasing; the first is `+inf`.
    pub thresholds: Vec<f64>,
}

/// ROC curve over the distinct score thresholds.
///
/// Starts at `(0, 0)` with an infinite threshold and ends at `(1, 1)`.
/// Intermediate points that are collinear with their neighbours are dropped.
pub fn roc_curve(y_true: &[u8], scores: &[f64]) -> Result<RocCurve> {
    check_lengths(y_true, scores.len(), "scores")?;
    validate_labels(y_true)?;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut fps = Vec::new();
    let mut tps = Vec::new();
    let mut thresholds = Vec::new();
    let (mut tp, mut fp) = (0usize, 0usize);
    for (pos, &i) in order.iter().enumerate() {
        if y_true[i] == 1 {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_group = pos + 1 == order.len() || scores[order[pos + 1]] != scores[i];
        if last_of_group {
            fps.push(fp as f64);
            tps.push(tp as f64);
            thresholds.push(scores[i]);
        }
    }

    // Keep the ends and every point where the slope changes.
    let keep: Vec<usize> = (0..fps.len())
        .filter(|&k| {
            k == 0
                || k + 1 == fps.len()
                || fps[k + 1] - 2.0 * fps[k] + fps[k - 1] != 0.0
                || tps[k + 1] - 2.0 * tps[k] + tps[k - 1] != 0.0
        })
        .collect();

    let n_pos = tp as f64;
    let n_neg = fp as f64;
    if n_pos == 0.0 {
        log::warn!("No positive samples in y_true; true positive rate is undefined");
    }
    if n_neg == 0.0 {
        log::warn!("No negative samples in y_true; false positive rate is undefined");
    }
    let rate = |count: f64, total: f64| if total > 0.0 { count / total } else { f64::NAN };

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    for k in keep {
        curve.fpr.push(rate(fps[k], n_neg));
        curve.tpr.push(rate(tps[k], n_pos));
        curve.thresholds.push(thresholds[k]);
    }
    Ok(curve)
}

/// Binary confusion matrix laid out as `[[tn, fp], [fn, tp]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &[u8], y_pred: &[u8]) -> Result<Self> {
        check_lengths(y_true, y_pred.len(), "predictions")?;
        validate_labels(y_true)?;
        validate_labels(y_pred)?;
        let mut cm = ConfusionMatrix {
            tn: 0,
            fp: 0,
            fn_: 0,
            tp: 0,
        };
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t, p) {
                (0, 0) => cm.tn += 1,
                (0, _) => cm.fp += 1,
                (_, 0) => cm.fn_ += 1,
                _ => cm.tp += 1,
            }
        }
        Ok(cm)
    }

    pub fn as_array(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }

    /// True class counts `[legitimate, fraud]`.
    pub fn row_sums(&self) -> [usize; 2] {
        [self.tn + self.fp, self.fn_ + self.tp]
    }

    /// Predicted class counts `[legitimate, fraud]`.
    pub fn column_sums(&self) -> [usize; 2] {
        [self.tn + self.fn_, self.fp + self.tp]
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = [self.tn, self.fp, self.fn_, self.tp]
            .iter()
            .map(|v| v.to_string().len())
            .max()
            .unwrap_or(1);
        write!(
            f,
            "[[{:>w$} {:>w$}]\n [{:>w$} {:>w$}]]",
            self.tn,
            self.fp,
            self.fn_,
            self.tp,
            w = width
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision, recall and F1 with accuracy and averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    /// Indexed by label: `[legitimate, fraud]`.
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

fn ratio(num: usize, den: usize) -> f64 {
    // Undefined precision/recall is reported as 0.
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    pub fn from_predictions(y_true: &[u8], y_pred: &[u8]) -> Result<Self> {
        let cm = ConfusionMatrix::from_predictions(y_true, y_pred)?;
        Ok(Self::from_confusion(&cm))
    }

    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let m = cm.as_array();
        let predicted = cm.column_sums();
        let actual = cm.row_sums();

        let class = |c: usize| {
            let precision = ratio(m[c][c], predicted[c]);
            let recall = ratio(m[c][c], actual[c]);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                precision,
                recall,
                f1,
                support: actual[c],
            }
        };
        let classes = [class(0), class(1)];
        let total = cm.total();

        let macro_avg = ClassMetrics {
            precision: (classes[0].precision + classes[1].precision) / 2.0,
            recall: (classes[0].recall + classes[1].recall) / 2.0,
            f1: (classes[0].f1 + classes[1].f1) / 2.0,
            support: total,
        };
        let weighted = |get: fn(&ClassMetrics) -> f64| {
            classes
                .iter()
                .map(|c| get(c) * c.support as f64)
                .sum::<f64>()
                / total.max(1) as f64
        };
        let weighted_avg = ClassMetrics {
            precision: weighted(|c: &ClassMetrics| c.precision),
            recall: weighted(|c: &ClassMetrics| c.recall),
            f1: weighted(|c: &ClassMetrics| c.f1),
            support: total,
        };

        ClassificationReport {
            classes,
            accuracy: ratio(cm.tn + cm.tp, total),
            macro_avg,
            weighted_avg,
        }
    }

    /// Text table with `digits` decimals, in the layout:
    ///
    /// ```text
    ///               precision    recall  f1-score   support
    ///
    ///            0       1.00      1.00      1.00     56864
    ///            1       0.88      0.81      0.84        98
    ///
    ///     accuracy                           1.00     56962
    ///    macro avg       0.94      0.90      0.92     56962
    /// weighted avg       1.00      1.00      1.00     56962
    /// ```
    pub fn format(&self, digits: usize) -> String {
        let width = "weighted avg".len().max(digits);
        let row = |name: &str, m: &ClassMetrics| {
            format!(
                "{:>w$}  {:>9.d$} {:>9.d$} {:>9.d$} {:>9}\n",
                name,
                m.precision,
                m.recall,
                m.f1,
                m.support,
                w = width,
                d = digits
            )
        };

        let mut out = format!(
            "{:>w$}  {:>9} {:>9} {:>9} {:>9}\n\n",
            "",
            "precision",
            "recall",
            "f1-score",
            "support",
            w = width
        );
        out.push_str(&row("0", &self.classes[0]));
        out.push_str(&row("1", &self.classes[1]));
        out.push('\n');
        out.push_str(&format!(
            "{:>w$}  {:>9} {:>9} {:>9.d$} {:>9}\n",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.macro_avg.support,
            w = width,
            d = digits
        ));
        out.push_str(&row("macro avg", &self.macro_avg));
        out.push_str(&row("weighted avg", &self.weighted_avg));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auc_extremes_and_ties() {
        let y = [0, 0, 1, 1];
        assert_eq!(roc_auc(&y, &[0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_eq!(roc_auc(&y, &[0.9, 0.8, 0.2, 0.1]).unwrap(), 0.0);
        assert_eq!(roc_auc(&y, &[0.5; 4]).unwrap(), 0.5);
        assert!(roc_auc(&[1, 1], &[0.1, 0.2]).is_err());
    }

    #[test]
    fn auc_matches_pair_counting() {
        let y = [0, 1, 0, 1, 0, 1];
        let s = [0.1, 0.4, 0.35, 0.8, 0.4, 0.2];
        // 9 (fraud, legitimate) pairs; 6 ordered correctly and one tie
        let auc = roc_auc(&y, &s).unwrap();
        assert!((auc - 6.5 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn roc_curve_endpoints_and_shape() {
        let y = [0, 0, 1, 1];
        let s = [0.1, 0.4, 0.35, 0.8];
        let roc = roc_curve(&y, &s).unwrap();
        assert_eq!(roc.fpr, vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_eq!(roc.tpr, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert_eq!(roc.thresholds[0], f64::INFINITY);
        assert_eq!(&roc.thresholds[1..], &[0.8, 0.4, 0.35, 0.1]);
    }

    #[test]
    fn roc_curve_drops_collinear_points() {
        let y = [1, 1, 1, 0];
        let s = [0.9, 0.8, 0.7, 0.1];
        let roc = roc_curve(&y, &s).unwrap();
        assert_eq!(roc.tpr, vec![0.0, 1.0 / 3.0, 1.0, 1.0]);
        assert_eq!(roc.fpr, vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn confusion_matrix_sums() {
        let y_true = [0, 0, 0, 1, 1];
        let y_pred = [0, 1, 0, 1, 0];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred).unwrap();
        assert_eq!(cm.as_array(), [[2, 1], [1, 1]]);
        assert_eq!(cm.row_sums(), [3, 2]);
        assert_eq!(cm.column_sums(), [3, 2]);
        assert_eq!(cm.to_string(), "[[2 1]\n [1 1]]");
    }

    #[test]
    fn report_values_and_layout() {
        let y_true = [0, 0, 0, 1, 1];
        let y_pred = [0, 1, 0, 1, 0];
        let report = ClassificationReport::from_predictions(&y_true, &y_pred).unwrap();
        assert!((report.classes[0].precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.classes[1].recall - 0.5).abs() < 1e-12);
        assert!((report.accuracy - 0.6).abs() < 1e-12);

        let text = report.format(2);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "              precision    recall  f1-score   support");
        assert_eq!(lines[2], "           0       0.67      0.67      0.67         3");
        assert_eq!(lines[5], "    accuracy                           0.60         5");
        assert!(lines[7].starts_with("weighted avg"));
    }

    #[test]
    fn zero_division_reports_zero() {
        let report = ClassificationReport::from_predictions(&[0, 1], &[0, 0]).unwrap();
        assert_eq!(report.classes[1].precision, 0.0);
        assert_eq!(report.classes[1].f1, 0.0);
        assert_eq!(accuracy(&[0, 1], &[0, 0]).unwrap(), 0.5);
    }
}
