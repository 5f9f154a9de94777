//! Reader for delimited text and spreadsheet transaction tables.
use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use ndarray::Array2;

use crate::data_handling::{separate_features_and_labels, Dataset};

/// On-disk layout of a table, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Delimited text with the given field separator.
    Delimited(u8),
    /// First worksheet of an Excel/OpenDocument workbook.
    Spreadsheet,
}

impl TableFormat {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(TableFormat::Delimited(b',')),
            Some("tsv") | Some("txt") => Ok(TableFormat::Delimited(b'\t')),
            Some("xlsx") | Some("xlsm") | Some("xls") | Some("xlsb") | Some("ods") => {
                Ok(TableFormat::Spreadsheet)
            }
            _ => bail!(
                "Unsupported table format for {}: expected .csv, .tsv, .xlsx, .xls or .ods",
                path.as_ref().display()
            ),
        }
    }
}

/// Configuration for reading a labelled transaction table.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Column name holding the binary label (0 legitimate / 1 fraud).
    pub label_column: String,
    /// Optional list of feature columns to load (in order).
    /// When `None`, all non-label, non-ignored columns are features.
    pub feature_columns: Option<Vec<String>>,
    /// Columns to skip when auto-selecting features.
    pub ignore_columns: Vec<String>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            label_column: "Class".to_string(),
            feature_columns: None,
            ignore_columns: Vec::new(),
        }
    }
}

impl ReaderConfig {
    pub fn with_label_column(label_column: &str) -> Self {
        Self {
            label_column: label_column.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

/// Read a labelled table using the default `Class` label column.
pub fn read_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    read_dataset_with_config(path, &ReaderConfig::default())
}

/// Read a labelled table using a custom configuration.
pub fn read_dataset_with_config<P: AsRef<Path>>(path: P, config: &ReaderConfig) -> Result<Dataset> {
    let path = path.as_ref();
    if !path.exists() {
        bail!("Dataset file does not exist: {}", path.display());
    }

    let raw = match TableFormat::from_path(path)? {
        TableFormat::Delimited(delimiter) => read_delimited(path, delimiter)?,
        TableFormat::Spreadsheet => read_spreadsheet(path)?,
    };
    if raw.rows.is_empty() {
        bail!("No data rows in {}", path.display());
    }

    let label_idx = find_column(&raw.headers, &config.label_column)
        .ok_or_else(|| anyhow!("Missing label column '{}'", config.label_column))?;
    let feature_indices = resolve_feature_indices(&raw.headers, config, label_idx)?;
    if feature_indices.is_empty() {
        bail!("No feature columns detected in header of {}", path.display());
    }

    let mut columns = feature_indices.clone();
    columns.push(label_idx);
    let headers: Vec<String> = columns.iter().map(|&i| raw.headers[i].clone()).collect();

    let mut values = Vec::with_capacity(raw.rows.len() * columns.len());
    for (row_idx, row) in raw.rows.iter().enumerate() {
        for &col in &columns {
            let cell = row.get(col).unwrap_or(&Cell::Empty);
            let value = parse_cell(cell).with_context(|| {
                format!(
                    "Invalid value in column '{}' at row {} of {}",
                    raw.headers[col],
                    row_idx + 1,
                    path.display()
                )
            })?;
            values.push(value);
        }
    }

    let table = Array2::from_shape_vec((raw.rows.len(), columns.len()), values)
        .context("Failed to build feature matrix")?;

    let dataset = separate_features_and_labels(&headers, &table, &config.label_column)
        .with_context(|| format!("Failed to separate features and labels in {}", path.display()))?;

    log::info!(
        "Loaded {} rows x {} features from {}",
        dataset.n_samples(),
        dataset.n_features(),
        path.display()
    );
    Ok(dataset)
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open table: {}", path.display()))?;

    let headers = reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    let field = field.trim();
                    if field.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(RawTable { headers, rows })
}

fn read_spreadsheet(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("Workbook has no worksheets: {}", path.display()))?
        .with_context(|| format!("Failed to read first worksheet of {}", path.display()))?;

    let mut rows_iter = range.rows();
    let headers = rows_iter
        .next()
        .ok_or_else(|| anyhow!("Worksheet is empty: {}", path.display()))?
        .iter()
        .map(|cell| match cell {
            Data::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .collect();

    let rows = rows_iter
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::Int(v) => Cell::Number(*v as f64),
                    Data::Float(v) => Cell::Number(*v),
                    Data::Bool(v) => Cell::Number(if *v { 1.0 } else { 0.0 }),
                    Data::String(s) if s.trim().is_empty() => Cell::Empty,
                    Data::String(s) => Cell::Text(s.trim().to_string()),
                    Data::Empty => Cell::Empty,
                    other => Cell::Text(other.to_string()),
                })
                .collect()
        })
        .collect();

    Ok(RawTable { headers, rows })
}

fn parse_cell(cell: &Cell) -> Result<f64> {
    let value = match cell {
        Cell::Number(v) => *v,
        Cell::Text(s) => s
            .parse::<f64>()
            .map_err(|_| anyhow!("'{}' is not a number", s))?,
        Cell::Empty => bail!("empty cell"),
    };
    if !value.is_finite() {
        bail!("non-finite value {}", value);
    }
    Ok(value)
}

fn find_column(headers: &[String], name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case(name))
}

fn resolve_feature_indices(
    headers: &[String],
    config: &ReaderConfig,
    label_idx: usize,
) -> Result<Vec<usize>> {
    if let Some(names) = &config.feature_columns {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = find_column(headers, name)
                .ok_or_else(|| anyhow!("Missing feature column '{}'", name))?;
            if idx == label_idx {
                bail!("Label column '{}' cannot also be a feature", name);
            }
            indices.push(idx);
        }
        return Ok(indices);
    }

    let ignore: HashSet<String> = config
        .ignore_columns
        .iter()
        .map(|name| name.to_ascii_lowercase())
        .collect();

    Ok(headers
        .iter()
        .enumerate()
        .filter(|(idx, header)| *idx != label_idx && !ignore.contains(&header.to_ascii_lowercase()))
        .map(|(idx, _)| idx)
        .collect())
}
