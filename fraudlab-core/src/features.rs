//! Feature preparation: derives the model feature set from raw transactions.
//!
//! Derivation is a pure function of one `Transaction` and a `FeatureStats`
//! snapshot. The statistics are fitted once over the full dataset, before the
//! train/test split, and reused unchanged for every partition and for export.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Transaction, COMPONENT_COUNT};
use crate::schema::component_column;

const SECONDS_PER_DAY: f64 = 60.0 * 60.0 * 24.0;
const IQR_MULTIPLIER: f64 = 1.5;

/// Errors from feature preparation.
#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("empty dataset: feature statistics need at least one transaction")]
    EmptyDataset,
}

// ─── Global statistics ───────────────────────────────────────────────

/// Full-dataset statistics shared by every derived feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub row_count: usize,
    pub log_amount_mean: f64,
    /// Sample standard deviation (n - 1) of `log1p(amount)`.
    pub log_amount_std: f64,
    pub amount_q1: f64,
    pub amount_q3: f64,
    /// `Q3 + 1.5 * (Q3 - Q1)`; amounts strictly above are flagged as outliers.
    pub amount_upper_bound: f64,
}

impl FeatureStats {
    pub fn fit(records: &[Transaction]) -> Result<Self, FeatureError> {
        if records.is_empty() {
            return Err(FeatureError::EmptyDataset);
        }

        let log_amounts: Vec<f64> = records.iter().map(|r| r.amount.ln_1p()).collect();
        let n = log_amounts.len() as f64;
        let mean = log_amounts.iter().sum::<f64>() / n;
        let std = if log_amounts.len() > 1 {
            let ss: f64 = log_amounts.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        } else {
            f64::NAN
        };
        // A single row or a constant amount column has no spread to scale by.
        let std = if std.is_finite() && std > 0.0 { std } else { 1.0 };

        let mut amounts: Vec<f64> = records.iter().map(|r| r.amount).collect();
        amounts.sort_by(f64::total_cmp);
        let q1 = quantile_sorted(&amounts, 0.25);
        let q3 = quantile_sorted(&amounts, 0.75);

        Ok(Self {
            row_count: records.len(),
            log_amount_mean: mean,
            log_amount_std: std,
            amount_q1: q1,
            amount_q3: q3,
            amount_upper_bound: q3 + IQR_MULTIPLIER * (q3 - q1),
        })
    }

    pub fn is_amount_outlier(&self, amount: f64) -> bool {
        amount > self.amount_upper_bound
    }
}

/// Quantile of an ascending slice with linear interpolation between order statistics.
///
/// Returns NaN for an empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

// ─── Feature vector ──────────────────────────────────────────────────

/// Features derived from one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub hour_sin: f64,
    pub hour_cos: f64,
    pub amount_log: f64,
    pub amount_scaled: f64,
    pub amount_outlier: bool,
    pub v_sum: f64,
    pub v_mean: f64,
    /// Population standard deviation of the components.
    pub v_std: f64,
}

impl FeatureVector {
    pub fn derive(record: &Transaction, stats: &FeatureStats) -> Self {
        let days = record.time / SECONDS_PER_DAY;
        let hour = (days * 24.0).rem_euclid(24.0);
        let angle = 2.0 * PI * hour / 24.0;

        let amount_log = record.amount.ln_1p();
        let amount_scaled = (amount_log - stats.log_amount_mean) / stats.log_amount_std;

        let n = COMPONENT_COUNT as f64;
        let v_sum: f64 = record.components.iter().sum();
        let v_mean = v_sum / n;
        let v_var = record
            .components
            .iter()
            .map(|v| (v - v_mean).powi(2))
            .sum::<f64>()
            / n;

        Self {
            hour_sin: angle.sin(),
            hour_cos: angle.cos(),
            amount_log,
            amount_scaled,
            amount_outlier: stats.is_amount_outlier(record.amount),
            v_sum,
            v_mean,
            v_std: v_var.sqrt(),
        }
    }
}

/// A raw transaction paired with its derived features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedRecord {
    pub transaction: Transaction,
    pub features: FeatureVector,
}

/// Derive features for every record with the given statistics.
///
/// Output has the same length and order as the input.
pub fn prepare(
    records: &[Transaction],
    stats: &FeatureStats,
) -> Result<Vec<PreparedRecord>, FeatureError> {
    if records.is_empty() {
        return Err(FeatureError::EmptyDataset);
    }
    Ok(records
        .iter()
        .map(|r| PreparedRecord {
            transaction: r.clone(),
            features: FeatureVector::derive(r, stats),
        })
        .collect())
}

/// Fit statistics over `records`, then derive features with them.
pub fn fit_and_prepare(
    records: &[Transaction],
) -> Result<(FeatureStats, Vec<PreparedRecord>), FeatureError> {
    let stats = FeatureStats::fit(records)?;
    let prepared = prepare(records, &stats)?;
    tracing::info!(
        rows = prepared.len(),
        log_amount_mean = stats.log_amount_mean,
        log_amount_std = stats.log_amount_std,
        amount_upper_bound = stats.amount_upper_bound,
        "prepared features"
    );
    Ok((stats, prepared))
}

// ─── Feature names ───────────────────────────────────────────────────

/// A named, model-selectable feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Feature {
    /// Anonymized component, 0-based (`Component(0)` is `V1`).
    Component(usize),
    HourSin,
    HourCos,
    AmountLog,
    AmountScaled,
    AmountOutlier,
    VSum,
    VMean,
    VStd,
}

impl Feature {
    pub fn name(&self) -> String {
        match self {
            Self::Component(i) => component_column(*i),
            Self::HourSin => "Hour_Sin".into(),
            Self::HourCos => "Hour_Cos".into(),
            Self::AmountLog => "Amount_Log".into(),
            Self::AmountScaled => "Amount_Scaled".into(),
            Self::AmountOutlier => "Amount_Outlier".into(),
            Self::VSum => "V_Sum".into(),
            Self::VMean => "V_Mean".into(),
            Self::VStd => "V_Std".into(),
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Hour_Sin" => Some(Self::HourSin),
            "Hour_Cos" => Some(Self::HourCos),
            "Amount_Log" => Some(Self::AmountLog),
            "Amount_Scaled" => Some(Self::AmountScaled),
            "Amount_Outlier" => Some(Self::AmountOutlier),
            "V_Sum" => Some(Self::VSum),
            "V_Mean" => Some(Self::VMean),
            "V_Std" => Some(Self::VStd),
            other => {
                let n: usize = other.strip_prefix('V')?.parse().ok()?;
                (1..=COMPONENT_COUNT)
                    .contains(&n)
                    .then_some(Self::Component(n - 1))
            }
        }
    }

    pub fn value(&self, record: &PreparedRecord) -> f64 {
        let f = &record.features;
        match self {
            Self::Component(i) => record.transaction.components[*i],
            Self::HourSin => f.hour_sin,
            Self::HourCos => f.hour_cos,
            Self::AmountLog => f.amount_log,
            Self::AmountScaled => f.amount_scaled,
            Self::AmountOutlier => {
                if f.amount_outlier {
                    1.0
                } else {
                    0.0
                }
            }
            Self::VSum => f.v_sum,
            Self::VMean => f.v_mean,
            Self::VStd => f.v_std,
        }
    }

    /// Every derived (non-component) feature, in export column order.
    pub fn derived() -> [Feature; 8] {
        [
            Self::HourSin,
            Self::HourCos,
            Self::AmountLog,
            Self::AmountScaled,
            Self::AmountOutlier,
            Self::VSum,
            Self::VMean,
            Self::VStd,
        ]
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<String> for Feature {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown feature '{value}'"))
    }
}

impl From<Feature> for String {
    fn from(value: Feature) -> Self {
        value.name()
    }
}

/// The default model feature list: `V1`..`V28`, `Hour_Sin`, `Hour_Cos`,
/// `Amount_Scaled`, `V_Sum`, `V_Mean`, `V_Std`.
pub fn default_model_features() -> Vec<Feature> {
    let mut features: Vec<Feature> = (0..COMPONENT_COUNT).map(Feature::Component).collect();
    features.extend([
        Feature::HourSin,
        Feature::HourCos,
        Feature::AmountScaled,
        Feature::VSum,
        Feature::VMean,
        Feature::VStd,
    ]);
    features
}
