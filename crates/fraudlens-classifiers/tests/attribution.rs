//! TreeSHAP attribution on a fitted random forest.

use fraudlens_classifiers::config::{MaxFeatures, ModelType};
use fraudlens_classifiers::explain::{mean_abs_importance, AttributionValues, TreeExplainer};
use fraudlens_classifiers::models::factory;
use ndarray::{Array2, Axis};

/// Only column 1 carries signal; column 2 is constant.
fn signal_in_second_column(n: usize) -> (Array2<f64>, Vec<u8>) {
    let y: Vec<u8> = (0..n).map(|i| u8::from(i % 5 == 0)).collect();
    let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
        0 => ((i * 11) % 7) as f64,
        1 => y[i] as f64 * 4.0 + ((i * 3) % 5) as f64 * 0.1,
        _ => 1.0,
    });
    (x, y)
}

fn forest() -> ModelType {
    ModelType::RandomForest {
        n_estimators: 20,
        max_depth: Some(5),
        min_samples_split: 2,
        min_samples_leaf: 1,
        max_features: MaxFeatures::All,
        balanced: false,
        seed: 42,
    }
}

#[test]
fn attributions_sum_to_prediction_minus_base_value() {
    let (x, y) = signal_in_second_column(60);
    let mut model = factory::build_model_type(&forest()).unwrap();
    model.fit(&x, &y).unwrap();

    let explainer = TreeExplainer::from_model(model.as_ref()).unwrap();
    let base = explainer.expected_value();
    assert!((base[0] + base[1] - 1.0).abs() < 1e-12);

    let values = explainer.shap_values(&x).unwrap();
    assert_eq!(values.n_classes(), 2);
    let fraud = values.positive_class().unwrap();
    assert_eq!(fraud.dim(), (60, 3));

    let proba = model.predict_proba(&x).unwrap();
    for (row, p) in fraud.axis_iter(Axis(0)).zip(&proba) {
        assert!((row.sum() + base[1] - p).abs() < 1e-9);
    }

    // constant feature never splits
    assert!(fraud.column(2).iter().all(|v| v.abs() < 1e-12));
}

#[test]
fn informative_feature_ranks_first() {
    let (x, y) = signal_in_second_column(60);
    let mut model = factory::build_model_type(&forest()).unwrap();
    model.fit(&x, &y).unwrap();

    let values = TreeExplainer::from_model(model.as_ref())
        .unwrap()
        .shap_values(&x)
        .unwrap()
        .positive_class()
        .unwrap();
    let names = vec!["noise".to_string(), "signal".to_string(), "constant".to_string()];
    let ranking = mean_abs_importance(&values, &names).unwrap();
    assert_eq!(ranking[0].name, "signal");
    assert_eq!(ranking[2].name, "constant");
}

#[test]
fn non_tree_models_cannot_be_explained() {
    let (x, y) = signal_in_second_column(20);
    let mut model = factory::build_model_type(&ModelType::logistic_regression(true)).unwrap();
    model.fit(&x, &y).unwrap();
    assert!(TreeExplainer::from_model(model.as_ref()).is_err());
}

#[test]
fn single_class_list_has_no_positive_class() {
    let values = AttributionValues::PerClassList(vec![Array2::zeros((2, 2))]);
    assert!(values.positive_class().is_err());
    let single = AttributionValues::SingleMatrix(Array2::ones((2, 2)));
    assert_eq!(single.positive_class().unwrap().sum(), 4.0);
}
