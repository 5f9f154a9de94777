//! Integration tests for run configuration loading and CLI overrides.

use std::path::PathBuf;

use fraudlens_classifiers::config::ModelType;
use fraudlens_classifiers::pipeline::PipelineConfig;
use fraudlens_cli::compare::{apply_overrides, load_pipeline_config, RunOverrides};

// ---------------------------------------------------------------------------
// load_pipeline_config
// ---------------------------------------------------------------------------

#[test]
fn defaults_when_no_file() {
    let cfg = load_pipeline_config(None).unwrap();
    assert_eq!(cfg.label_column, "Class");
    assert_eq!(cfg.test_fraction, 0.2);
    assert_eq!(cfg.models.len(), 3);
    assert_eq!(cfg.explain_model, "Random Forest");
}

#[test]
fn partial_json_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cfg.json");
    std::fs::write(&path, r#"{ "seed": 7, "report": { "enabled": false } }"#).unwrap();

    let cfg = load_pipeline_config(Some(&path)).unwrap();
    assert_eq!(cfg.seed, 7);
    assert!(!cfg.report.enabled);
    assert_eq!(cfg.report.path, "fraudlens_report.html");
    assert_eq!(cfg.label_column, "Class");
    match &cfg.models[1].model_type {
        ModelType::RandomForest { seed, .. } => assert_eq!(*seed, 7),
        other => panic!("unexpected model {}", other.kind()),
    }
}

#[test]
fn round_trip_through_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cfg.json");
    let original = PipelineConfig::default();
    std::fs::write(&path, serde_json::to_string(&original).unwrap()).unwrap();

    let loaded = load_pipeline_config(Some(&path)).unwrap();
    assert_eq!(loaded.models.len(), original.models.len());
    assert!(matches!(loaded.models[2].model_type, ModelType::Stacking { .. }));
}

#[test]
fn malformed_json_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cfg.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = load_pipeline_config(Some(&path)).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config"));
}

// ---------------------------------------------------------------------------
// apply_overrides
// ---------------------------------------------------------------------------

#[test]
fn seed_override_reaches_seeded_models() {
    let mut cfg = PipelineConfig::default();
    apply_overrides(
        &mut cfg,
        &RunOverrides {
            seed: Some(123),
            ..Default::default()
        },
    );
    assert_eq!(cfg.seed, 123);
    match &cfg.models[1].model_type {
        ModelType::RandomForest { seed, .. } => assert_eq!(*seed, 123),
        other => panic!("unexpected model {}", other.kind()),
    }
}

#[test]
fn report_path_override_enables_report() {
    let mut cfg = PipelineConfig::default();
    cfg.report.enabled = false;
    apply_overrides(
        &mut cfg,
        &RunOverrides {
            report_path: Some(PathBuf::from("out/r.html")),
            label_column: Some("is_fraud".to_string()),
            ..Default::default()
        },
    );
    assert!(cfg.report.enabled);
    assert_eq!(cfg.report.path, "out/r.html");
    assert_eq!(cfg.label_column, "is_fraud");
}

#[test]
fn empty_overrides_change_nothing() {
    let mut cfg = PipelineConfig::default();
    apply_overrides(&mut cfg, &RunOverrides::default());
    assert_eq!(cfg.seed, 42);
    assert!(cfg.report.enabled);
    assert!(cfg.attribution.enabled);
    assert_eq!(cfg.dataset_path, "credit_card_fraud_dataset.xlsx");
}
