//! fraudlens-classifiers: classifier comparison for tabular fraud data.
//!
//! This crate provides dataset loading (CSV/TSV/spreadsheets), stratified
//! splitting, standardization, a small family of binary classifiers behind a
//! common trait (logistic regression, random forest, gradient-boosted trees,
//! kernel SVM and a stacked ensemble), exact TreeSHAP attribution for tree
//! ensembles, evaluation metrics, and Plotly/HTML reporting.
//!
//! The `pipeline` module strings these together into the exploratory
//! train-compare-explain run driven by the `fraudlens` CLI.
pub mod config;
pub mod data_handling;
pub mod error;
pub mod explain;
pub mod io;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod report;
