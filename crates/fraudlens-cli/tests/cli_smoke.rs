//! CLI binary smoke tests using assert_cmd.
//!
//! These tests exercise the compiled `fraudlens` binary to verify that
//! argument parsing, help text, and error handling work end-to-end.

use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use fraudlens_classifiers::config::{MaxFeatures, ModelConfig, ModelType};
use fraudlens_classifiers::pipeline::PipelineConfig;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("fraudlens").unwrap()
}

fn write_csv(dir: &Path) -> PathBuf {
    let path = dir.join("tx.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "V1,Amount,Class").unwrap();
    for i in 0..100 {
        let fraud = i % 10 == 0;
        let amount = if fraud { 500.0 + i as f64 } else { (i % 17) as f64 * 5.0 };
        writeln!(file, "{:.3},{:.2},{}", ((i * 7) % 13) as f64 / 13.0, amount, u8::from(fraud)).unwrap();
    }
    path
}

fn write_fast_config(dir: &Path) -> PathBuf {
    let mut config = PipelineConfig::default();
    config.models = vec![
        ModelConfig::new("Logistic Regression", ModelType::logistic_regression(true)),
        ModelConfig::new(
            "Random Forest",
            ModelType::RandomForest {
                n_estimators: 5,
                max_depth: Some(4),
                min_samples_split: 2,
                min_samples_leaf: 1,
                max_features: MaxFeatures::All,
                balanced: true,
                seed: 42,
            },
        ),
    ];
    let path = dir.join("config.json");
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[test]
fn no_args_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_flag() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fraudlens"));
}

// ---------------------------------------------------------------------------
// config subcommand
// ---------------------------------------------------------------------------

#[test]
fn config_prints_default_template() {
    cmd()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dataset_path\""))
        .stdout(predicate::str::contains("\"test_fraction\": 0.2"))
        .stdout(predicate::str::contains("\"seed\": 42"))
        .stdout(predicate::str::contains("Stacked Ensemble"));
}

// ---------------------------------------------------------------------------
// run subcommand
// ---------------------------------------------------------------------------

#[test]
fn run_without_dataset_errors() {
    cmd()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<dataset>"));
}

#[test]
fn run_nonexistent_dataset_errors() {
    cmd()
        .args(["run", "/nonexistent/tx.csv", "--no-report"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Run failed"));
}

#[test]
fn run_nonexistent_config_errors() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_csv(dir.path());
    cmd()
        .arg("run")
        .arg(&data)
        .arg("/nonexistent/config.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn report_and_no_report_conflict() {
    cmd()
        .args(["run", "tx.csv", "-o", "r.html", "--no-report"])
        .assert()
        .failure();
}

#[test]
fn run_prints_evaluation_and_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_csv(dir.path());
    let config = write_fast_config(dir.path());
    let report = dir.path().join("report.html");

    cmd()
        .arg("run")
        .arg(&data)
        .arg(&config)
        .arg("-o")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("--- Logistic Regression ---"))
        .stdout(predicate::str::contains("--- Random Forest ---"))
        .stdout(predicate::str::contains("Confusion Matrix:"))
        .stdout(predicate::str::contains("Feature attribution (Random Forest"));

    let html = std::fs::read_to_string(&report).unwrap();
    assert!(html.contains("Model Comparison"));
}

#[test]
fn run_console_only() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_csv(dir.path());
    let config = write_fast_config(dir.path());

    cmd()
        .current_dir(dir.path())
        .arg("run")
        .arg(&data)
        .arg(&config)
        .args(["--no-report", "--no-explain", "--seed", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Accuracy:"))
        .stdout(predicate::str::contains("Feature attribution").not());

    assert!(!dir.path().join("fraudlens_report.html").exists());
}
