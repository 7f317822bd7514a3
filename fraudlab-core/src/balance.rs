//! Class balancer: two-stage resampling of the training partition.
//!
//! Stage 1 undersamples the majority (legitimate) class without replacement.
//! Stage 2 synthesizes minority (fraud) rows by interpolating between a
//! minority row and one of its nearest minority neighbours until the minority
//! reaches `oversampling_ratio` of the reduced majority.
//!
//! The balancer only ever sees the training `Dataset`. Synthetic rows carry
//! `SampleId::Synthetic` ids, so they can never be mistaken for a record.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::Dataset;
use crate::domain::{ClassCounts, Label, SampleId};
use crate::rng::{stage, RngHierarchy};

/// Fewest neighbours a minority row needs for interpolation.
pub const MIN_NEIGHBORS: usize = 2;

/// Balancer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Share of the majority class kept by stage 1 (default 0.5).
    pub undersampling_ratio: f64,
    /// Minority target as a share of the reduced majority (default 0.5).
    pub oversampling_ratio: f64,
    /// Neighbours considered per minority row (default 5).
    pub k_neighbors: usize,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            undersampling_ratio: 0.5,
            oversampling_ratio: 0.5,
            k_neighbors: 5,
        }
    }
}

/// Errors from the balancing stage.
#[derive(Debug, Error, PartialEq)]
pub enum BalanceError {
    #[error("degenerate minority class: {minority} row(s) give {neighbors} neighbour(s), interpolation needs at least 2")]
    DegenerateClass { minority: usize, neighbors: usize },
    #[error("invalid balance ratio '{name}' = {value}: must lie in (0, 1]")]
    InvalidRatio { name: &'static str, value: f64 },
}

/// Class counts before and after each stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub input: ClassCounts,
    pub after_undersampling: ClassCounts,
    pub output: ClassCounts,
    pub synthesized: usize,
}

/// Resampled training set plus its bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct BalancedDataset {
    pub dataset: Dataset,
    pub report: BalanceReport,
}

/// Two-stage balancer bound to one configuration and seed.
#[derive(Debug, Clone)]
pub struct ClassBalancer {
    config: BalanceConfig,
    rng: RngHierarchy,
}

impl ClassBalancer {
    pub fn new(config: BalanceConfig, rng: RngHierarchy) -> Self {
        Self { config, rng }
    }

    /// Resample a training dataset.
    ///
    /// Output order: kept majority rows (input order), original minority rows
    /// (input order), synthetic rows (generation order).
    pub fn balance(&self, train: &Dataset) -> Result<BalancedDataset, BalanceError> {
        check_ratio("undersampling_ratio", self.config.undersampling_ratio)?;
        check_ratio("oversampling_ratio", self.config.oversampling_ratio)?;

        let input = train.class_counts();
        let majority = train.indices_of(Label::Legitimate);
        let minority = train.indices_of(Label::Fraud);

        // Stage 1: random undersampling of the majority.
        let target_majority =
            (self.config.undersampling_ratio * majority.len() as f64).floor() as usize;
        let mut under_rng = self.rng.rng_for(stage::BALANCE, "undersample", 0);
        let mut kept: Vec<usize> = index::sample(&mut under_rng, majority.len(), target_majority)
            .into_iter()
            .map(|i| majority[i])
            .collect();
        kept.sort_unstable();

        let after_undersampling = ClassCounts {
            legitimate: kept.len(),
            fraud: minority.len(),
        };

        // Stage 2: synthetic minority oversampling.
        let target_minority =
            (self.config.oversampling_ratio * kept.len() as f64).floor() as usize;
        let needed = target_minority.saturating_sub(minority.len());

        let mut order = kept;
        order.extend_from_slice(&minority);
        let reduced = train.subset(&order);

        let dataset = if needed == 0 {
            reduced
        } else {
            let neighbors = minority.len().saturating_sub(1);
            if neighbors < MIN_NEIGHBORS {
                return Err(BalanceError::DegenerateClass {
                    minority: minority.len(),
                    neighbors,
                });
            }
            let k = self.config.k_neighbors.clamp(1, neighbors);
            let mut over_rng = self.rng.rng_for(stage::BALANCE, "oversample", 0);
            let minority_rows: Vec<&[f64]> =
                minority.iter().map(|&i| train.rows()[i].as_slice()).collect();
            let synthetic = interpolate(&minority_rows, k, needed, &mut over_rng);
            append_synthetic(reduced, synthetic)
        };

        let report = BalanceReport {
            input,
            after_undersampling,
            output: dataset.class_counts(),
            synthesized: needed,
        };
        tracing::info!(
            majority_in = input.legitimate,
            minority_in = input.fraud,
            majority_out = report.output.legitimate,
            minority_out = report.output.fraud,
            synthesized = needed,
            "balanced training data"
        );

        Ok(BalancedDataset { dataset, report })
    }
}

fn check_ratio(name: &'static str, value: f64) -> Result<(), BalanceError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(BalanceError::InvalidRatio { name, value })
    }
}

/// Indices of the `k` nearest rows to `rows[target]` (Euclidean), excluding itself.
///
/// Equal distances resolve to the lower index.
pub fn nearest_neighbors(rows: &[&[f64]], target: usize, k: usize) -> Vec<usize> {
    let mut dists: Vec<(f64, usize)> = rows
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != target)
        .map(|(i, row)| (squared_distance(rows[target], row), i))
        .collect();
    dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    dists.into_iter().take(k).map(|(_, i)| i).collect()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Generate `count` synthetic rows from minority `rows` using `k` neighbours.
fn interpolate(rows: &[&[f64]], k: usize, count: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let neighbors: Vec<Vec<usize>> = (0..rows.len())
        .map(|i| nearest_neighbors(rows, i, k))
        .collect();

    (0..count)
        .map(|_| {
            let base = rng.gen_range(0..rows.len());
            let pick = neighbors[base][rng.gen_range(0..neighbors[base].len())];
            let gap: f64 = rng.gen();
            rows[base]
                .iter()
                .zip(rows[pick])
                .map(|(b, n)| b + gap * (n - b))
                .collect()
        })
        .collect()
}

fn append_synthetic(reduced: Dataset, synthetic: Vec<Vec<f64>>) -> Dataset {
    let names = reduced.feature_names().to_vec();
    let mut rows = reduced.rows().to_vec();
    let mut labels = reduced.labels().to_vec();
    let mut ids = reduced.ids().to_vec();
    for (seq, row) in synthetic.into_iter().enumerate() {
        rows.push(row);
        labels.push(Label::Fraud);
        ids.push(SampleId::Synthetic(seq));
    }
    Dataset::new(names, rows, labels, ids)
}
