//! The `fraudlens run` command.
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use fraudlens_classifiers::pipeline::{
    build_report, format_evaluation, run_pipeline, PipelineConfig, PipelineResult,
};

/// Command-line values that take precedence over the JSON config.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub dataset_path: Option<PathBuf>,
    pub seed: Option<u64>,
    pub test_fraction: Option<f64>,
    pub label_column: Option<String>,
    pub report_path: Option<PathBuf>,
    pub no_report: bool,
    pub no_explain: bool,
}

/// Load a run configuration from a JSON file, or defaults when no file is given.
pub fn load_pipeline_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            log::info!("Using config: {}", path.display());
            PipelineConfig::from_json_file(path)
        }
        None => {
            log::info!("No config file provided; using defaults.");
            Ok(PipelineConfig::default())
        }
    }
}

pub fn apply_overrides(config: &mut PipelineConfig, overrides: &RunOverrides) {
    if let Some(path) = &overrides.dataset_path {
        config.dataset_path = path.to_string_lossy().into_owned();
    }
    if let Some(seed) = overrides.seed {
        config.set_seed(seed);
    }
    if let Some(fraction) = overrides.test_fraction {
        config.test_fraction = fraction;
    }
    if let Some(label) = &overrides.label_column {
        config.label_column = label.clone();
    }
    if let Some(path) = &overrides.report_path {
        config.report.path = path.to_string_lossy().into_owned();
        config.report.enabled = true;
    }
    if overrides.no_report {
        config.report.enabled = false;
    }
    if overrides.no_explain {
        config.attribution.enabled = false;
    }
}

/// Write every model's evaluation block followed by the attribution ranking.
pub fn write_summary<W: Write>(out: &mut W, result: &PipelineResult, max_display: usize) -> Result<()> {
    for evaluation in &result.evaluations {
        writeln!(out, "{}", format_evaluation(evaluation))?;
    }
    if let Some(attribution) = &result.attribution {
        writeln!(
            out,
            "--- Feature attribution ({}, base value {:.4}) ---",
            attribution.model_name, attribution.expected_value
        )?;
        for (rank, feature) in attribution.importance.iter().take(max_display).enumerate() {
            writeln!(out, "{:>3}. {:<24} {:.6}", rank + 1, feature.name, feature.mean_abs)?;
        }
    }
    Ok(())
}

/// Run the comparison, print results to stdout and write the report.
pub fn run_comparison(config: &PipelineConfig) -> Result<PipelineResult> {
    let result = run_pipeline(config)?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write_summary(&mut handle, &result, config.attribution.max_display)?;
    handle.flush()?;

    if config.report.enabled {
        let report = build_report(&result, config)?;
        report
            .save_to_file(&config.report.path)
            .with_context(|| format!("Failed to save report to {}", config.report.path))?;
    }
    Ok(result)
}
