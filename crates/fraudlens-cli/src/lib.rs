//! fraudlens-cli: command line helpers around the classifier comparison
//! pipeline (config loading, CLI overrides, console and report output).
pub mod compare;
