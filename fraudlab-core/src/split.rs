//! Stratified train/test split.
//!
//! Each class is shuffled independently with the split stream of the RNG
//! hierarchy and cut at `round(test_fraction * class_count)`. Both partitions
//! are emitted in input order, so the same seed and input always produce the
//! same partitions.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ClassCounts, Label, Transaction};
use crate::features::PreparedRecord;
use crate::rng::{stage, RngHierarchy};

/// Minimum rows per class for a stratified split (one per side).
pub const MIN_SAMPLES_PER_CLASS: usize = 2;

/// Split configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of each class assigned to the test partition (default 0.2).
    pub test_fraction: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { test_fraction: 0.2 }
    }
}

/// Errors from the split stage.
#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("insufficient samples: class '{label}' has {count} row(s), stratification needs at least 2")]
    InsufficientSamples { label: Label, count: usize },
    #[error("test fraction {0} must lie strictly between 0 and 1")]
    InvalidTestFraction(f64),
}

/// Anything that carries a class label.
pub trait Labeled {
    fn label(&self) -> Label;
}

impl Labeled for Transaction {
    fn label(&self) -> Label {
        self.label
    }
}

impl Labeled for PreparedRecord {
    fn label(&self) -> Label {
        self.transaction.label
    }
}

/// Disjoint train and test partitions.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit<T> {
    pub train: Vec<T>,
    pub test: Vec<T>,
}

impl<T: Labeled> TrainTestSplit<T> {
    pub fn train_counts(&self) -> ClassCounts {
        counts(&self.train)
    }

    pub fn test_counts(&self) -> ClassCounts {
        counts(&self.test)
    }
}

fn counts<T: Labeled>(items: &[T]) -> ClassCounts {
    let labels: Vec<Label> = items.iter().map(Labeled::label).collect();
    ClassCounts::from_labels(&labels)
}

/// Partition `items` into train/test, preserving the class ratio in both.
pub fn stratified_split<T: Labeled + Clone>(
    items: &[T],
    config: &SplitConfig,
    rng: &RngHierarchy,
) -> Result<TrainTestSplit<T>, SplitError> {
    let fraction = config.test_fraction;
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(SplitError::InvalidTestFraction(fraction));
    }

    let by_class: Vec<(Label, Vec<usize>)> = [Label::Legitimate, Label::Fraud]
        .into_iter()
        .map(|label| {
            let idx = items
                .iter()
                .enumerate()
                .filter(|(_, item)| item.label() == label)
                .map(|(i, _)| i)
                .collect::<Vec<_>>();
            (label, idx)
        })
        .collect();

    for (label, idx) in &by_class {
        if idx.len() < MIN_SAMPLES_PER_CLASS {
            return Err(SplitError::InsufficientSamples {
                label: *label,
                count: idx.len(),
            });
        }
    }

    let mut stream = rng.rng_for(stage::SPLIT, "", 0);
    let mut in_test = vec![false; items.len()];
    for (_, mut idx) in by_class {
        let n = idx.len();
        let n_test = ((fraction * n as f64).round() as usize).clamp(1, n - 1);
        idx.shuffle(&mut stream);
        for &i in &idx[..n_test] {
            in_test[i] = true;
        }
    }

    let mut train = Vec::with_capacity(items.len());
    let mut test = Vec::new();
    for (item, is_test) in items.iter().zip(in_test) {
        if is_test {
            test.push(item.clone());
        } else {
            train.push(item.clone());
        }
    }

    tracing::info!(
        train_rows = train.len(),
        test_rows = test.len(),
        test_fraction = fraction,
        "stratified split"
    );

    Ok(TrainTestSplit { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::COMPONENT_COUNT;

    fn records(legit: usize, fraud: usize) -> Vec<Transaction> {
        (0..legit + fraud)
            .map(|i| Transaction {
                id: i,
                time: i as f64,
                components: [0.0; COMPONENT_COUNT],
                amount: 1.0,
                label: if i < legit { Label::Legitimate } else { Label::Fraud },
            })
            .collect()
    }

    #[test]
    fn split_is_stratified() {
        let data = records(990, 10);
        let split = stratified_split(&data, &SplitConfig::default(), &RngHierarchy::new(42)).unwrap();
        assert_eq!(split.test_counts(), ClassCounts { legitimate: 198, fraud: 2 });
        assert_eq!(split.train_counts(), ClassCounts { legitimate: 792, fraud: 8 });
    }

    #[test]
    fn partitions_keep_input_order() {
        let data = records(50, 10);
        let split = stratified_split(&data, &SplitConfig::default(), &RngHierarchy::new(1)).unwrap();
        assert!(split.train.windows(2).all(|w| w[0].id < w[1].id));
        assert!(split.test.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn same_seed_same_split() {
        let data = records(200, 20);
        let a = stratified_split(&data, &SplitConfig::default(), &RngHierarchy::new(42)).unwrap();
        let b = stratified_split(&data, &SplitConfig::default(), &RngHierarchy::new(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_different_split() {
        let data = records(200, 20);
        let a = stratified_split(&data, &SplitConfig::default(), &RngHierarchy::new(42)).unwrap();
        let b = stratified_split(&data, &SplitConfig::default(), &RngHierarchy::new(7)).unwrap();
        assert_ne!(a.test, b.test);
    }

    #[test]
    fn single_fraud_row_is_insufficient() {
        let data = records(100, 1);
        let err = stratified_split(&data, &SplitConfig::default(), &RngHierarchy::new(42)).unwrap_err();
        assert_eq!(
            err,
            SplitError::InsufficientSamples {
                label: Label::Fraud,
                count: 1
            }
        );
    }

    #[test]
    fn tiny_classes_still_get_one_row_each_side() {
        let data = records(2, 2);
        let split = stratified_split(&data, &SplitConfig::default(), &RngHierarchy::new(42)).unwrap();
        assert_eq!(split.test_counts(), ClassCounts { legitimate: 1, fraud: 1 });
        assert_eq!(split.train_counts(), ClassCounts { legitimate: 1, fraud: 1 });
    }

    #[test]
    fn invalid_fraction_rejected() {
        let data = records(10, 10);
        for fraction in [0.0, 1.0, -0.1, f64::NAN] {
            let config = SplitConfig { test_fraction: fraction };
            assert!(matches!(
                stratified_split(&data, &config, &RngHierarchy::new(42)),
                Err(SplitError::InvalidTestFraction(_))
            ));
        }
    }
}
