//! IO utilities for loading tabular transaction data.

pub mod tabular;

pub use tabular::{read_dataset, read_dataset_with_config, ReaderConfig, TableFormat};
