//! Data structures and helpers for holding and partitioning labelled
//! transaction data.
//!
//! `Dataset` keeps the feature matrix, the binary label vector and the
//! feature names row-aligned. The splitting helpers produce the stratified
//! holdout partition and the stratified folds used by stacking.
use anyhow::{bail, Result};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::ClassifierError;

/// Label value for legitimate transactions.
pub const LEGITIMATE: u8 = 0;
/// Label value for fraudulent transactions.
pub const FRAUD: u8 = 1;

#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Array1<u8>,
    pub feature_names: Vec<String>,
}

impl Dataset {
    pub fn new(x: Array2<f64>, y: Array1<u8>, feature_names: Vec<String>) -> Result<Self> {
        if x.nrows() != y.len() {
            bail!(ClassifierError::LengthMismatch {
                what: "labels",
                expected: x.nrows(),
                actual: y.len(),
            });
        }
        if feature_names.len() != x.ncols() {
            bail!(ClassifierError::LengthMismatch {
                what: "feature names",
                expected: x.ncols(),
                actual: feature_names.len(),
            });
        }
        if let Some(&bad) = y.iter().find(|&&v| v > FRAUD) {
            bail!(ClassifierError::InvalidLabel(bad));
        }
        Ok(Dataset {
            x,
            y,
            feature_names,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn labels(&self) -> Vec<u8> {
        self.y.to_vec()
    }

    /// Number of legitimate and fraudulent rows, in that order.
    pub fn class_counts(&self) -> [usize; 2] {
        class_counts(self.y.iter().copied())
    }

    /// Fraction of rows labelled as fraud.
    pub fn fraud_rate(&self) -> f64 {
        if self.y.is_empty() {
            return 0.0;
        }
        self.class_counts()[FRAUD as usize] as f64 / self.y.len() as f64
    }

    /// Build a new dataset holding only the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            x: self.x.select(Axis(0), indices),
            y: self.y.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
        }
    }

    /// Replace the feature matrix, keeping labels and names.
    pub fn with_features(&self, x: Array2<f64>) -> Result<Dataset> {
        Dataset::new(x, self.y.clone(), self.feature_names.clone())
    }

    pub fn log_input_data_summary(&self) {
        let [legit, fraud] = self.class_counts();
        log::info!("----- Input Data Summary -----");
        log::info!(
            "{} legitimate and {} fraudulent transactions ({:.4}% fraud)",
            legit,
            fraud,
            self.fraud_rate() * 100.0
        );
        log::info!("{} feature columns", self.n_features());
        log::info!("-------------------------------");
    }
}

/// Separate a fully numeric table into features and labels by the name of
/// the label column. Column order of the remaining features is preserved.
pub fn separate_features_and_labels(
    headers: &[String],
    table: &Array2<f64>,
    label_column: &str,
) -> Result<Dataset> {
    if headers.len() != table.ncols() {
        bail!(ClassifierError::LengthMismatch {
            what: "header row",
            expected: table.ncols(),
            actual: headers.len(),
        });
    }
    let Some(label_idx) = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(label_column))
    else {
        bail!("Missing label column '{}'", label_column);
    };

    let mut labels = Vec::with_capacity(table.nrows());
    for (row, &value) in table.column(label_idx).iter().enumerate() {
        let label = if value == 0.0 {
            LEGITIMATE
        } else if value == 1.0 {
            FRAUD
        } else {
            bail!(
                "Invalid label {} at row {}: '{}' must be 0 or 1",
                value,
                row + 1,
                label_column
            );
        };
        labels.push(label);
    }

    let feature_idx: Vec<usize> = (0..headers.len()).filter(|&i| i != label_idx).collect();
    if feature_idx.is_empty() {
        bail!(ClassifierError::EmptyInput("feature columns"));
    }
    let x = table.select(Axis(1), &feature_idx);
    let feature_names = feature_idx.iter().map(|&i| headers[i].clone()).collect();

    Dataset::new(x, Array1::from_vec(labels), feature_names)
}

pub fn validate_labels(y: &[u8]) -> Result<()> {
    if let Some(&bad) = y.iter().find(|&&v| v > FRAUD) {
        bail!(ClassifierError::InvalidLabel(bad));
    }
    Ok(())
}

pub fn class_counts<I: IntoIterator<Item = u8>>(labels: I) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for label in labels {
        counts[label as usize] += 1;
    }
    counts
}

/// Stratified holdout partition of a dataset.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: Dataset,
    pub test: Dataset,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Partition rows into train and test sets preserving the label ratio.
///
/// The holdout receives `round(test_fraction * n)` rows. Each class
/// contributes in proportion to its size (largest remainder rounding), and
/// rows are drawn from a `StdRng` seeded with `seed`, so the same inputs
/// always give the same partition.
pub fn stratified_train_test_split(
    dataset: &Dataset,
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        bail!(ClassifierError::InvalidParameter(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }
    let n_samples = dataset.n_samples();
    if n_samples == 0 {
        bail!(ClassifierError::EmptyInput("dataset"));
    }

    let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (i, &label) in dataset.y.iter().enumerate() {
        by_class[label as usize].push(i);
    }
    for (class, members) in by_class.iter().enumerate() {
        if members.len() == 1 {
            bail!(ClassifierError::TooFewClassMembers {
                class: class as u8,
                count: 1,
                required: 2,
            });
        }
    }
    let n_classes = by_class.iter().filter(|m| !m.is_empty()).count();

    let n_test = (test_fraction * n_samples as f64).round() as usize;
    let n_train = n_samples - n_test;
    if n_test < n_classes || n_train < n_classes {
        bail!(ClassifierError::InvalidParameter(format!(
            "a split of {} rows into {} train / {} test cannot hold all {} classes",
            n_samples, n_train, n_test, n_classes
        )));
    }

    let counts = [by_class[0].len(), by_class[1].len()];
    let allocation = allocate_proportionally(&counts, n_test);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_indices = Vec::with_capacity(n_train);
    let mut test_indices = Vec::with_capacity(n_test);
    for (members, &k) in by_class.iter_mut().zip(allocation.iter()) {
        members.shuffle(&mut rng);
        test_indices.extend_from_slice(&members[..k]);
        train_indices.extend_from_slice(&members[k..]);
    }
    train_indices.shuffle(&mut rng);
    test_indices.shuffle(&mut rng);

    log::debug!(
        "Stratified split: {} train / {} test rows (test allocation per class {:?})",
        train_indices.len(),
        test_indices.len(),
        allocation
    );

    Ok(TrainTestSplit {
        train: dataset.select_rows(&train_indices),
        test: dataset.select_rows(&test_indices),
        train_indices,
        test_indices,
    })
}

/// Split `total` draws across classes in proportion to `counts`, using the
/// largest remainder rule. No class is assigned all of its members.
fn allocate_proportionally(counts: &[usize; 2], total: usize) -> [usize; 2] {
    let n: usize = counts.iter().sum();
    let mut allocation = [0usize; 2];
    let mut remainders = Vec::with_capacity(2);
    for (class, &count) in counts.iter().enumerate() {
        let exact = count as f64 * total as f64 / n as f64;
        let floor = (exact.floor() as usize).min(count.saturating_sub(1));
        allocation[class] = floor;
        remainders.push((class, exact - floor as f64));
    }
    remainders.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(counts[b.0].cmp(&counts[a.0]))
    });

    let mut assigned: usize = allocation.iter().sum();
    while assigned < total {
        let mut progressed = false;
        for &(class, _) in &remainders {
            if assigned == total {
                break;
            }
            if allocation[class] + 1 < counts[class] {
                allocation[class] += 1;
                assigned += 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    allocation
}

/// Row indices of one cross-validation fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Deterministic stratified K-fold assignment without shuffling.
///
/// Samples are assigned as if the labels were sorted and dealt round-robin
/// into `n_splits` folds; within each class the original row order is kept,
/// so consecutive members of a class land in the same fold.
pub fn stratified_kfold(y: &[u8], n_splits: usize) -> Result<Vec<Fold>> {
    validate_labels(y)?;
    if n_splits < 2 {
        bail!(ClassifierError::InvalidParameter(format!(
            "stratified k-fold needs at least 2 splits, got {}",
            n_splits
        )));
    }
    if n_splits > y.len() {
        bail!(ClassifierError::InvalidParameter(format!(
            "cannot split {} samples into {} folds",
            y.len(),
            n_splits
        )));
    }

    let counts = class_counts(y.iter().copied());
    let min_present = counts.iter().filter(|&&c| c > 0).min().copied().unwrap_or(0);
    if min_present < n_splits {
        log::warn!(
            "The least populated class has only {} members, which is less than n_splits={}",
            min_present,
            n_splits
        );
    }

    // Per-class fold sizes from dealing the sorted labels round-robin.
    let count_below = |m: usize, fold: usize| m / n_splits + usize::from(fold < m % n_splits);
    let mut per_fold = [vec![0usize; n_splits], vec![0usize; n_splits]];
    let mut start = 0usize;
    for class in 0..2 {
        let end = start + counts[class];
        for fold in 0..n_splits {
            per_fold[class][fold] = count_below(end, fold) - count_below(start, fold);
        }
        start = end;
    }

    let mut test_fold = vec![0usize; y.len()];
    let mut cursor = [(0usize, 0usize); 2];
    for (i, &label) in y.iter().enumerate() {
        let class = label as usize;
        let (fold, used) = &mut cursor[class];
        while *used >= per_fold[class][*fold] {
            *fold += 1;
            *used = 0;
        }
        test_fold[i] = *fold;
        *used += 1;
    }

    Ok((0..n_splits)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|&i| test_fold[i] == fold);
            Fold { train, test }
        })
        .collect())
}
