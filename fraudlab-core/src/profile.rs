//! Data profile: summary statistics of the raw dataset.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::{ClassCounts, Label, Transaction};
use crate::features::{FeatureError, FeatureStats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataProfile {
    pub rows: usize,
    /// Rows identical to an earlier row on every raw value.
    pub duplicate_rows: usize,
    pub class_counts: ClassCounts,
    /// `fraud / legitimate`; `None` when there are no legitimate rows.
    pub fraud_ratio: Option<f64>,
    pub fraud_percentage: f64,
    pub mean_amount_legitimate: Option<f64>,
    pub mean_amount_fraud: Option<f64>,
    pub amount_q1: f64,
    pub amount_q3: f64,
    pub amount_upper_bound: f64,
    pub amount_outliers: usize,
}

impl DataProfile {
    pub fn build(records: &[Transaction]) -> Result<Self, FeatureError> {
        let stats = FeatureStats::fit(records)?;
        let class_counts = ClassCounts::from_labels(records.iter().map(|r| &r.label));

        let mut seen = HashSet::with_capacity(records.len());
        let duplicate_rows = records.iter().filter(|r| !seen.insert(row_key(r))).count();

        let profile = Self {
            rows: records.len(),
            duplicate_rows,
            class_counts,
            fraud_ratio: (class_counts.legitimate > 0)
                .then(|| class_counts.fraud as f64 / class_counts.legitimate as f64),
            fraud_percentage: 100.0 * class_counts.fraud_share(),
            mean_amount_legitimate: mean_amount(records, Label::Legitimate),
            mean_amount_fraud: mean_amount(records, Label::Fraud),
            amount_q1: stats.amount_q1,
            amount_q3: stats.amount_q3,
            amount_upper_bound: stats.amount_upper_bound,
            amount_outliers: records
                .iter()
                .filter(|r| stats.is_amount_outlier(r.amount))
                .count(),
        };
        tracing::info!(
            rows = profile.rows,
            duplicates = profile.duplicate_rows,
            fraud = class_counts.fraud,
            fraud_pct = profile.fraud_percentage,
            outliers = profile.amount_outliers,
            "profiled dataset"
        );
        Ok(profile)
    }
}

/// Bit patterns of all 31 raw values; the row id is not part of the key.
fn row_key(r: &Transaction) -> Vec<u64> {
    // `+ 0.0` folds -0.0 into 0.0 so signed zeros compare equal.
    let bits = |v: f64| (v + 0.0).to_bits();
    let mut key = Vec::with_capacity(31);
    key.push(bits(r.time));
    key.extend(r.components.iter().map(|&v| bits(v)));
    key.push(bits(r.amount));
    key.push(u64::from(r.label.class_value()));
    key
}

fn mean_amount(records: &[Transaction], label: Label) -> Option<f64> {
    let amounts: Vec<f64> = records
        .iter()
        .filter(|r| r.label == label)
        .map(|r| r.amount)
        .collect();
    if amounts.is_empty() {
        None
    } else {
        Some(amounts.iter().sum::<f64>() / amounts.len() as f64)
    }
}
