//! Integration tests for evaluation metrics.

use fraudlens_classifiers::metrics::{
    accuracy, roc_auc, roc_curve, ClassificationReport, ConfusionMatrix,
};
use fraudlens_classifiers::models::utils::labels_from_proba;

fn trapezoid(fpr: &[f64], tpr: &[f64]) -> f64 {
    fpr.windows(2)
        .zip(tpr.windows(2))
        .map(|(x, y)| (x[1] - x[0]) * (y[1] + y[0]) / 2.0)
        .sum()
}

#[test]
fn area_under_roc_points_matches_rank_auc() {
    let y = vec![0, 1, 0, 0, 1, 1, 0, 1, 0, 0];
    let scores = vec![0.1, 0.7, 0.35, 0.7, 0.9, 0.2, 0.05, 0.6, 0.6, 0.3];
    let roc = roc_curve(&y, &scores).unwrap();
    let auc = roc_auc(&y, &scores).unwrap();
    assert!((trapezoid(&roc.fpr, &roc.tpr) - auc).abs() < 1e-12);
    assert_eq!(*roc.fpr.last().unwrap(), 1.0);
    assert_eq!(*roc.tpr.last().unwrap(), 1.0);
    assert!(roc.fpr.windows(2).all(|w| w[0] <= w[1]));
    assert!(roc.thresholds.windows(2).all(|w| w[0] > w[1]));
}

#[test]
fn report_and_confusion_agree() {
    let y_true = vec![0, 0, 0, 0, 0, 0, 1, 1, 1, 0];
    let proba = vec![0.1, 0.6, 0.2, 0.3, 0.05, 0.4, 0.9, 0.45, 0.8, 0.5];
    let y_pred = labels_from_proba(&proba);
    // 0.5 is not above the threshold
    assert_eq!(y_pred[9], 0);

    let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred).unwrap();
    assert_eq!(cm.as_array(), [[6, 1], [1, 2]]);
    assert_eq!(cm.total(), y_true.len());

    let report = ClassificationReport::from_confusion(&cm);
    assert_eq!(report.classes[0].support + report.classes[1].support, 10);
    assert!((report.accuracy - accuracy(&y_true, &y_pred).unwrap()).abs() < 1e-12);
    assert!((report.classes[1].precision - 2.0 / 3.0).abs() < 1e-12);

    let text = report.format(2);
    assert!(text.contains("macro avg"));
    assert!(text.contains("weighted avg"));
}

#[test]
fn mismatched_lengths_are_errors() {
    assert!(accuracy(&[0, 1], &[0]).is_err());
    assert!(roc_auc(&[0, 1], &[0.2]).is_err());
    assert!(ConfusionMatrix::from_predictions(&[0, 1, 1], &[0, 1]).is_err());
}
