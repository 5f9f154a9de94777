//! End-to-end model comparison run.
//!
//! Load → stratified split → standardize (fit on train only) → fit every
//! configured model → evaluate on the holdout → explain one tree ensemble.
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use maud::html;
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::data_handling::{stratified_train_test_split, Dataset};
use crate::explain::{mean_abs_importance, FeatureImportance, TreeExplainer};
use crate::io::{read_dataset_with_config, ReaderConfig};
use crate::metrics::{
    accuracy, roc_auc, roc_curve, ClassificationReport, ConfusionMatrix, RocCurve,
};
use crate::models::factory::build_model;
use crate::models::utils::labels_from_proba;
use crate::models::ClassifierModel;
use crate::preprocessing::StandardScaler;
use crate::report::plots::{plot_attribution_importance, plot_attribution_summary, plot_roc_curves};
use crate::report::{Report, ReportSection};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    pub enabled: bool,
    /// Number of features shown in the attribution plots.
    pub max_display: usize,
    /// Explain at most this many holdout rows; `None` explains all of them.
    pub max_samples: Option<usize>,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_display: 20,
            max_samples: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "fraudlens_report.html".to_string(),
        }
    }
}

/// Parameters of one comparison run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub dataset_path: String,
    pub label_column: String,
    /// Explicit feature columns; all non-label columns when `None`.
    pub feature_columns: Option<Vec<String>>,
    pub ignore_columns: Vec<String>,
    pub test_fraction: f64,
    pub seed: u64,
    pub models: Vec<ModelConfig>,
    /// Name of the model (from `models`) to explain.
    pub explain_model: String,
    pub attribution: AttributionConfig,
    pub report: ReportConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let seed = 42;
        Self {
            dataset_path: "credit_card_fraud_dataset.xlsx".to_string(),
            label_column: "Class".to_string(),
            feature_columns: None,
            ignore_columns: Vec::new(),
            test_fraction: 0.2,
            seed,
            models: ModelConfig::default_comparison(seed),
            explain_model: "Random Forest".to_string(),
            attribution: AttributionConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; missing fields take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))
    }

    /// Parse a JSON configuration. The run seed is applied to every seeded
    /// model, so `"seed"` alone reseeds the default models too.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let mut config: PipelineConfig = serde_json::from_str(content)?;
        config.set_seed(config.seed);
        Ok(config)
    }

    /// Set the run seed and propagate it to every seeded model.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
        for model in self.models.iter_mut() {
            model.model_type.set_seed(seed);
        }
    }

    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            label_column: self.label_column.clone(),
            feature_columns: self.feature_columns.clone(),
            ignore_columns: self.ignore_columns.clone(),
        }
    }
}

/// Sizes and class balance of the holdout partition.
#[derive(Debug, Clone, Serialize)]
pub struct SplitSummary {
    pub n_samples: usize,
    pub n_features: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub dataset_fraud_rate: f64,
    pub train_fraud_rate: f64,
    pub test_fraud_rate: f64,
}

/// Holdout performance of one model.
#[derive(Debug, Clone)]
pub struct ModelEvaluation {
    pub name: String,
    pub accuracy: f64,
    pub auc: f64,
    pub report: ClassificationReport,
    pub confusion: ConfusionMatrix,
    pub roc: RocCurve,
    pub predictions: Vec<u8>,
    pub probabilities: Vec<f64>,
    pub fit_seconds: f64,
}

impl ModelEvaluation {
    pub fn from_probabilities(
        name: &str,
        y_true: &[u8],
        probabilities: Vec<f64>,
        fit_seconds: f64,
    ) -> Result<Self> {
        let predictions = labels_from_proba(&probabilities);
        Ok(ModelEvaluation {
            name: name.to_string(),
            accuracy: accuracy(y_true, &predictions)?,
            auc: roc_auc(y_true, &probabilities)
                .with_context(|| format!("Failed to compute AUC for '{}'", name))?,
            report: ClassificationReport::from_predictions(y_true, &predictions)?,
            confusion: ConfusionMatrix::from_predictions(y_true, &predictions)?,
            roc: roc_curve(y_true, &probabilities)?,
            predictions,
            probabilities,
            fit_seconds,
        })
    }
}

/// Fraud-class attributions of the explained model on holdout rows.
#[derive(Debug, Clone)]
pub struct AttributionSummary {
    pub model_name: String,
    pub expected_value: f64,
    /// Rows are explained holdout samples, columns are features.
    pub values: Array2<f64>,
    /// The standardized holdout rows that were explained.
    pub features: Array2<f64>,
    pub feature_names: Vec<String>,
    pub importance: Vec<FeatureImportance>,
}

#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub split: SplitSummary,
    pub evaluations: Vec<ModelEvaluation>,
    pub attribution: Option<AttributionSummary>,
}

/// Load the configured dataset and run the comparison.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineResult> {
    let dataset = read_dataset_with_config(&config.dataset_path, &config.reader_config())
        .with_context(|| format!("Failed to load dataset {}", config.dataset_path))?;
    run_pipeline_on(&dataset, config)
}

/// Run the comparison on an already loaded dataset.
pub fn run_pipeline_on(dataset: &Dataset, config: &PipelineConfig) -> Result<PipelineResult> {
    dataset.log_input_data_summary();

    let split = stratified_train_test_split(dataset, config.test_fraction, config.seed)?;
    log::info!(
        "Split {} rows into {} train / {} test (test fraud rate {:.4}%)",
        dataset.n_samples(),
        split.train.n_samples(),
        split.test.n_samples(),
        split.test.fraud_rate() * 100.0
    );

    let (scaler, x_train) = StandardScaler::fit_transform(&split.train.x)?;
    let x_test = scaler.transform(&split.test.x)?;
    let y_train = split.train.labels();
    let y_test = split.test.labels();

    let mut evaluations = Vec::with_capacity(config.models.len());
    let mut explained: Option<Box<dyn ClassifierModel>> = None;

    for model_config in &config.models {
        log::info!("Training {}", model_config.name);
        let start_time = Instant::now();
        let mut model = build_model(model_config)?;
        model
            .fit(&x_train, &y_train)
            .with_context(|| format!("Failed to fit model '{}'", model_config.name))?;
        let fit_seconds = start_time.elapsed().as_secs_f64();
        log::info!("{} trained in {:.2?}", model_config.name, start_time.elapsed());

        let probabilities = model.predict_proba(&x_test)?;
        let evaluation =
            ModelEvaluation::from_probabilities(&model_config.name, &y_test, probabilities, fit_seconds)?;
        log::info!(
            "{}: accuracy {:.4}, AUC {:.4}",
            evaluation.name,
            evaluation.accuracy,
            evaluation.auc
        );
        evaluations.push(evaluation);

        if explained.is_none() && model_config.name == config.explain_model {
            explained = Some(model);
        }
    }

    let attribution = if config.attribution.enabled {
        match explained {
            Some(model) => explain(
                model.as_ref(),
                &config.explain_model,
                &x_test,
                &dataset.feature_names,
                config.attribution.max_samples,
            )?,
            None => {
                log::warn!(
                    "Model '{}' is not among the configured models; skipping attribution",
                    config.explain_model
                );
                None
            }
        }
    } else {
        None
    };

    Ok(PipelineResult {
        split: SplitSummary {
            n_samples: dataset.n_samples(),
            n_features: dataset.n_features(),
            n_train: split.train.n_samples(),
            n_test: split.test.n_samples(),
            dataset_fraud_rate: dataset.fraud_rate(),
            train_fraud_rate: split.train.fraud_rate(),
            test_fraud_rate: split.test.fraud_rate(),
        },
        evaluations,
        attribution,
    })
}

fn explain(
    model: &dyn ClassifierModel,
    name: &str,
    x_test: &Array2<f64>,
    feature_names: &[String],
    max_samples: Option<usize>,
) -> Result<Option<AttributionSummary>> {
    if model.trees().is_none() {
        log::warn!(
            "Model '{}' is not a tree ensemble; skipping attribution",
            name
        );
        return Ok(None);
    }
    let explainer = TreeExplainer::from_model(model)?;

    // Holdout rows are already shuffled, so a prefix is a random sample.
    let n_rows = max_samples.map_or(x_test.nrows(), |m| m.min(x_test.nrows()));
    let features = x_test.slice(s![..n_rows, ..]).to_owned();
    log::info!("Computing attribution values for {} on {} rows", name, n_rows);

    let start_time = Instant::now();
    let values = explainer
        .shap_values(&features)?
        .positive_class()
        .context("Failed to select fraud-class attribution values")?;
    log::info!("Attribution finished in {:.2?}", start_time.elapsed());

    let importance = mean_abs_importance(&values, feature_names)?;
    Ok(Some(AttributionSummary {
        model_name: name.to_string(),
        expected_value: explainer.expected_value()[1],
        values,
        features,
        feature_names: feature_names.to_vec(),
        importance,
    }))
}

/// Console block for one model.
pub fn format_evaluation(evaluation: &ModelEvaluation) -> String {
    format!(
        "--- {} ---\nAccuracy: {:.2}    AUC: {:.2}\n{}\nConfusion Matrix:\n{}\n",
        evaluation.name,
        evaluation.accuracy,
        evaluation.auc,
        evaluation.report.format(2),
        evaluation.confusion
    )
}

/// Assemble the HTML report for a finished run.
pub fn build_report(result: &PipelineResult, config: &PipelineConfig) -> Result<Report> {
    let mut report = Report::new(
        "fraudlens",
        env!("CARGO_PKG_VERSION"),
        None,
        "Credit Card Fraud Model Comparison",
    );

    /* Section 1: Overview */
    {
        let split = &result.split;
        let mut overview = ReportSection::new("Overview");
        overview.add_content(html! {
            p {
                "Models are trained on a stratified " (format!("{:.0}", (1.0 - config.test_fraction) * 100.0))
                "% partition of the data and evaluated on the remaining holdout rows. "
                "Features are standardized with statistics from the training partition only."
            }
            table {
                tr { th { "Dataset" } td { (config.dataset_path) } }
                tr { th { "Rows" } td { (split.n_samples) } }
                tr { th { "Features" } td { (split.n_features) } }
                tr { th { "Train / test rows" } td { (split.n_train) " / " (split.n_test) } }
                tr { th { "Fraud rate (all / train / test)" }
                     td { (format!("{:.4}% / {:.4}% / {:.4}%",
                            split.dataset_fraud_rate * 100.0,
                            split.train_fraud_rate * 100.0,
                            split.test_fraud_rate * 100.0)) } }
                tr { th { "Seed" } td { (config.seed) } }
            }
        });
        report.add_section(overview);
    }

    /* Section 2: Model comparison */
    {
        let mut comparison = ReportSection::new("Model Comparison");
        comparison.add_content(html! {
            table {
                tr {
                    th { "Model" } th { "Accuracy" } th { "AUC" }
                    th { "Fraud precision" } th { "Fraud recall" } th { "Fraud F1" }
                    th { "TN" } th { "FP" } th { "FN" } th { "TP" } th { "Fit time (s)" }
                }
                @for e in &result.evaluations {
                    tr {
                        td { (e.name) }
                        td { (format!("{:.4}", e.accuracy)) }
                        td { (format!("{:.4}", e.auc)) }
                        td { (format!("{:.4}", e.report.classes[1].precision)) }
                        td { (format!("{:.4}", e.report.classes[1].recall)) }
                        td { (format!("{:.4}", e.report.classes[1].f1)) }
                        td { (e.confusion.tn) } td { (e.confusion.fp) }
                        td { (e.confusion.fn_) } td { (e.confusion.tp) }
                        td { (format!("{:.2}", e.fit_seconds)) }
                    }
                }
            }
        });
        let curves: Vec<(&str, &RocCurve, f64)> = result
            .evaluations
            .iter()
            .map(|e| (e.name.as_str(), &e.roc, e.auc))
            .collect();
        comparison.add_plot(plot_roc_curves(&curves));
        for e in &result.evaluations {
            comparison.add_content(html! {
                h3 { (e.name) }
                div class="code-container" { pre { (format_evaluation(e)) } }
            });
        }
        report.add_section(comparison);
    }

    /* Section 3: Attribution */
    if let Some(attribution) = &result.attribution {
        let max_display = config.attribution.max_display;
        let mut section = ReportSection::new("Feature Attribution");
        section.add_content(html! {
            p {
                "TreeSHAP attributions of the " (attribution.model_name) " fraud probability on "
                (attribution.values.nrows()) " holdout rows. Base value (expected fraud probability): "
                (format!("{:.4}", attribution.expected_value)) "."
            }
        });
        section.add_plot(plot_attribution_summary(
            &attribution.values,
            &attribution.features,
            &attribution.feature_names,
            max_display,
        )?);
        section.add_plot(plot_attribution_importance(&attribution.importance, max_display));
        report.add_section(section);
    }

    /* Section 4: Configuration */
    {
        let config_json = serde_json::to_string_pretty(config)?;
        let mut config_section = ReportSection::new("Configuration");
        config_section.add_content(html! {
            div class="code-container" {
                pre { code { (config_json) } }
            }
        });
        report.add_section(config_section);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelType;

    #[test]
    fn default_config_matches_comparison() {
        let config = PipelineConfig::default();
        assert_eq!(config.test_fraction, 0.2);
        assert_eq!(config.seed, 42);
        let names: Vec<&str> = config.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Logistic Regression", "Random Forest", "Stacked Ensemble"]);
        assert_eq!(config.explain_model, "Random Forest");
        assert_eq!(config.attribution.max_display, 20);
    }

    #[test]
    fn partial_json_takes_defaults() {
        let config =
            PipelineConfig::from_json_str(r#"{"dataset_path": "data.csv", "seed": 7}"#).unwrap();
        assert_eq!(config.dataset_path, "data.csv");
        assert_eq!(config.seed, 7);
        assert_eq!(config.label_column, "Class");
        assert_eq!(config.models.len(), 3);
    }

    #[test]
    fn json_seed_reaches_default_models() {
        let config = PipelineConfig::from_json_str(r#"{"seed": 7}"#).unwrap();
        match &config.models[1].model_type {
            ModelType::RandomForest { seed, .. } => assert_eq!(*seed, 7),
            other => panic!("unexpected model {}", other.kind()),
        }
        match &config.models[2].model_type {
            ModelType::Stacking { estimators, .. } => match &estimators[0].model_type {
                ModelType::RandomForest { seed, .. } => assert_eq!(*seed, 7),
                other => panic!("unexpected base estimator {}", other.kind()),
            },
            other => panic!("unexpected model {}", other.kind()),
        }
    }

    #[test]
    fn evaluation_block_layout() {
        let y = [0, 0, 1, 1];
        let e = ModelEvaluation::from_probabilities("Toy", &y, vec![0.1, 0.6, 0.7, 0.9], 0.0).unwrap();
        let text = format_evaluation(&e);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "--- Toy ---");
        assert_eq!(lines[1], "Accuracy: 0.75    AUC: 1.00");
        assert!(text.contains("Confusion Matrix:\n[[1 1]\n [0 2]]"));
    }
}
