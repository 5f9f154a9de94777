//! Factory and trait-level tests for every supported model type.

use fraudlens_classifiers::config::{MaxFeatures, ModelConfig, ModelType};
use fraudlens_classifiers::metrics::roc_auc;
use fraudlens_classifiers::models::factory;
use ndarray::Array2;

/// Two well separated clusters; every fourth row is fraud.
fn clusters(n: usize) -> (Array2<f64>, Vec<u8>) {
    let y: Vec<u8> = (0..n).map(|i| u8::from(i % 4 == 0)).collect();
    let x = Array2::from_shape_fn((n, 3), |(i, j)| {
        let jitter = ((i * 7 + j * 3) % 11) as f64 / 11.0 - 0.5;
        match (y[i], j) {
            (1, 0) => 2.0 + jitter,
            (0, 0) => -1.0 + jitter,
            _ => jitter,
        }
    });
    (x, y)
}

fn small_forest(seed: u64) -> ModelType {
    ModelType::RandomForest {
        n_estimators: 15,
        max_depth: Some(4),
        min_samples_split: 2,
        min_samples_leaf: 1,
        max_features: MaxFeatures::Sqrt,
        balanced: true,
        seed,
    }
}

fn small_gbdt() -> ModelType {
    ModelType::GBDT {
        learning_rate: 0.3,
        max_depth: 3,
        num_boost_round: 10,
        debug: false,
        training_optimization_level: 2,
        loss_type: "LogLikelyhood".to_string(),
        scale_pos_weight: None,
    }
}

fn small_stack(passthrough: bool) -> ModelType {
    ModelType::Stacking {
        estimators: vec![
            ModelConfig::new("rf", small_forest(42)),
            ModelConfig::new("lr", ModelType::logistic_regression(true)),
        ],
        final_estimator: Box::new(ModelType::logistic_regression(false)),
        cv: 3,
        passthrough,
    }
}

#[test]
fn factory_builds_fits_and_ranks_every_model() {
    let (x, y) = clusters(48);
    let configs = vec![
        ModelConfig::new("Logistic Regression", ModelType::logistic_regression(true)),
        ModelConfig::new("Random Forest", small_forest(42)),
        ModelConfig::new("GBDT", small_gbdt()),
        ModelConfig::new("SVM", ModelType::svm()),
        ModelConfig::new("Stacked Ensemble", small_stack(true)),
    ];

    for config in &configs {
        let mut model = factory::build_model(config).unwrap();
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), x.nrows(), "{}", config.name);
        assert!(
            proba.iter().all(|p| (0.0..=1.0).contains(p)),
            "{} produced a probability outside [0, 1]",
            config.name
        );
        let auc = roc_auc(&y, &proba).unwrap();
        assert!(auc > 0.9, "{} AUC {} on separable data", config.name, auc);

        let labels = model.predict(&x).unwrap();
        assert!(labels.iter().all(|&l| l <= 1));
    }
}

#[test]
fn default_stack_fits_forest_boosting_and_svm() {
    let (x, y) = clusters(60);
    let mut model = factory::build_model(&ModelConfig::new("Stacked Ensemble", ModelType::stacking(42))).unwrap();
    model.fit(&x, &y).unwrap();

    let proba = model.predict_proba(&x).unwrap();
    assert_eq!(proba.len(), 60);
    assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    assert!(roc_auc(&y, &proba).unwrap() > 0.9);
}

#[test]
fn only_forests_expose_trees() {
    let (x, y) = clusters(24);
    let mut forest = factory::build_model_type(&small_forest(1)).unwrap();
    forest.fit(&x, &y).unwrap();
    assert_eq!(forest.trees().map(|t| t.len()), Some(15));

    let mut lr = factory::build_model_type(&ModelType::logistic_regression(true)).unwrap();
    lr.fit(&x, &y).unwrap();
    assert!(lr.trees().is_none());
}

#[test]
fn fitting_requires_both_classes() {
    let (x, _) = clusters(12);
    let y = vec![0u8; 12];
    let mut model = factory::build_model_type(&ModelType::logistic_regression(true)).unwrap();
    assert!(model.fit(&x, &y).is_err());
}

#[test]
fn predicting_before_fit_is_an_error() {
    let (x, _) = clusters(8);
    for model_type in [ModelType::logistic_regression(true), small_forest(0), small_stack(false)] {
        let model = factory::build_model_type(&model_type).unwrap();
        assert!(model.predict_proba(&x).is_err());
    }
}

#[test]
fn model_type_parses_from_identifier() {
    let rf: ModelType = "random_forest".parse().unwrap();
    assert_eq!(rf.kind(), "random_forest");
    assert!("xgboost".parse::<ModelType>().is_err());
}
