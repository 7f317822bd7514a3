//! Classifier families: closed model set, common prediction trait, and fitting.
//!
//! Three families are supported:
//! - `logistic_regression`: class-weighted, L2-regularized logistic regression
//! - `random_forest`: bagged CART trees with per-split feature sampling
//! - `gradient_boosting`: Newton-boosted regression trees on the logistic loss
//!
//! Every family is fitted from a `Dataset` and an isolated `StdRng`, and
//! dispatches through the `TrainedModel` enum.

pub mod boosting;
pub mod forest;
pub mod logistic;
pub mod tree;

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::Dataset;
use crate::domain::Label;

pub use boosting::{BoostingConfig, GradientBoosting};
pub use forest::{ForestConfig, RandomForest};
pub use logistic::{LogisticConfig, LogisticModel};
pub use tree::{RegressionTree, TreeConfig};

// ─── Model kinds ─────────────────────────────────────────────────────

/// The closed set of classifier families, in enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LogisticRegression,
    RandomForest,
    GradientBoosting,
}

impl ModelKind {
    /// All families in enumeration order. Selection ties resolve by this order.
    pub const ALL: [ModelKind; 3] = [
        ModelKind::LogisticRegression,
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
    ];

    /// Name tag used for artifacts and RNG streams.
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "logistic_regression",
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
        }
    }

    /// Position in `ALL`.
    pub fn order(self) -> usize {
        match self {
            ModelKind::LogisticRegression => 0,
            ModelKind::RandomForest => 1,
            ModelKind::GradientBoosting => 2,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a name tag matches no model family.
#[derive(Debug, Error, PartialEq)]
#[error("unknown model kind: {0}")]
pub struct UnknownModelKind(pub String);

impl FromStr for ModelKind {
    type Err = UnknownModelKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| UnknownModelKind(s.to_string()))
    }
}

// ─── Classifier trait ────────────────────────────────────────────────

/// Prediction interface shared by every fitted model.
pub trait Classifier: Send + Sync {
    /// Probability that `row` is fraud, in [0, 1].
    fn predict_proba(&self, row: &[f64]) -> f64;

    /// Fraud when the probability reaches `threshold`.
    fn predict(&self, row: &[f64], threshold: f64) -> Label {
        if self.predict_proba(row) >= threshold {
            Label::Fraud
        } else {
            Label::Legitimate
        }
    }

    /// Per-feature importance in feature-list order, summing to 1 when any
    /// split was made. `None` for families without a notion of importance.
    fn feature_importance(&self) -> Option<Vec<f64>>;

    fn predict_proba_all(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_proba(r)).collect()
    }
}

// ─── Fitted models ───────────────────────────────────────────────────

/// A fitted model of any family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum TrainedModel {
    LogisticRegression(LogisticModel),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::LogisticRegression(_) => ModelKind::LogisticRegression,
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
            TrainedModel::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
        }
    }

    fn is_finite(&self) -> bool {
        match self {
            TrainedModel::LogisticRegression(m) => m.is_finite(),
            TrainedModel::RandomForest(m) => m.is_finite(),
            TrainedModel::GradientBoosting(m) => m.is_finite(),
        }
    }
}

impl Classifier for TrainedModel {
    fn predict_proba(&self, row: &[f64]) -> f64 {
        self.inner().predict_proba(row)
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        self.inner().feature_importance()
    }
}

// ─── Fitting ─────────────────────────────────────────────────────────

/// Hyperparameters for every family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub logistic: LogisticConfig,
    pub forest: ForestConfig,
    pub boosting: BoostingConfig,
}

/// Reasons a single family fails to fit. Recoverable at the trainer level.
#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("training set holds a single class ({0})")]
    SingleClass(Label),
    #[error("non-finite input value at row {row}, feature {feature}")]
    NonFiniteInput { row: usize, feature: usize },
    #[error("fitted parameters are not finite")]
    NonFiniteParameters,
}

/// Fit one family on `data` using the given RNG stream.
pub fn fit(
    kind: ModelKind,
    data: &Dataset,
    params: &ModelParams,
    rng: &mut StdRng,
) -> Result<TrainedModel, FitError> {
    check_trainable(data)?;
    let model = match kind {
        ModelKind::LogisticRegression => {
            TrainedModel::LogisticRegression(LogisticModel::fit(data, &params.logistic))
        }
        ModelKind::RandomForest => {
            TrainedModel::RandomForest(RandomForest::fit(data, &params.forest, rng))
        }
        ModelKind::GradientBoosting => {
            TrainedModel::GradientBoosting(GradientBoosting::fit(data, &params.boosting))
        }
    };
    if !model.is_finite() {
        return Err(FitError::NonFiniteParameters);
    }
    Ok(model)
}

fn check_trainable(data: &Dataset) -> Result<(), FitError> {
    if data.is_empty() {
        return Err(FitError::EmptyTrainingSet);
    }
    let counts = data.class_counts();
    if counts.fraud == 0 {
        return Err(FitError::SingleClass(Label::Legitimate));
    }
    if counts.legitimate == 0 {
        return Err(FitError::SingleClass(Label::Fraud));
    }
    for (row, values) in data.rows().iter().enumerate() {
        if let Some(feature) = values.iter().position(|v| !v.is_finite()) {
            return Err(FitError::NonFiniteInput { row, feature });
        }
    }
    Ok(())
}

/// Class-balanced sample weights: `n / (2 * n_c)` for a row of class `c`.
pub(crate) fn balanced_weights(labels: &[Label]) -> Vec<f64> {
    let n = labels.len() as f64;
    let fraud = labels.iter().filter(|l| l.is_fraud()).count() as f64;
    let legit = n - fraud;
    labels
        .iter()
        .map(|l| {
            let n_c = if l.is_fraud() { fraud } else { legit };
            if n_c > 0.0 {
                n / (2.0 * n_c)
            } else {
                0.0
            }
        })
        .collect()
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Normalize importances to sum to 1; all zeros stay zeros.
pub(crate) fn normalize(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        for v in values.iter_mut() {
            *v /= total;
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::dataset::Dataset;
    use crate::domain::{Label, SampleId};

    /// Two features: the first separates the classes, the second is noise.
    pub fn separable(legit: usize, fraud: usize) -> Dataset {
        let n = legit + fraud;
        let rows = (0..n)
            .map(|i| {
                let sign = if i < legit { -1.0 } else { 1.0 };
                vec![sign * (1.0 + (i % 3) as f64 * 0.1), ((i * 7) % 11) as f64 / 11.0]
            })
            .collect();
        let labels = (0..n)
            .map(|i| if i < legit { Label::Legitimate } else { Label::Fraud })
            .collect();
        let ids = (0..n).map(SampleId::Record).collect();
        Dataset::new(vec!["signal".into(), "noise".into()], rows, labels, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::RngHierarchy;

    #[test]
    fn kind_names_round_trip() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.name().parse::<ModelKind>().unwrap(), kind);
        }
        assert!("svm".parse::<ModelKind>().is_err());
    }

    #[test]
    fn enumeration_order_matches_all() {
        for (i, kind) in ModelKind::ALL.iter().enumerate() {
            assert_eq!(kind.order(), i);
        }
    }

    #[test]
    fn balanced_weights_equalize_class_mass() {
        let labels = [Label::Legitimate, Label::Legitimate, Label::Legitimate, Label::Fraud];
        let w = balanced_weights(&labels);
        let legit: f64 = w[..3].iter().sum();
        assert!((legit - w[3]).abs() < 1e-12);
        assert!((w.iter().sum::<f64>() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn single_class_is_rejected() {
        let data = test_support::separable(10, 0);
        let mut rng = RngHierarchy::new(1).rng_for("train", "x", 0);
        let err = fit(ModelKind::LogisticRegression, &data, &ModelParams::default(), &mut rng)
            .unwrap_err();
        assert_eq!(err, FitError::SingleClass(Label::Legitimate));
    }

    #[test]
    fn every_family_separates_easy_data() {
        let data = test_support::separable(40, 20);
        for kind in ModelKind::ALL {
            let mut rng = RngHierarchy::new(7).rng_for("train", kind.name(), 0);
            let model = fit(kind, &data, &ModelParams::default(), &mut rng).unwrap();
            assert_eq!(model.kind(), kind);
            assert!(model.predict_proba(&[1.1, 0.5]) > 0.5, "{kind}");
            assert!(model.predict_proba(&[-1.1, 0.5]) < 0.5, "{kind}");
            assert_eq!(model.predict(&[1.0, 0.0], 0.5), Label::Fraud);
        }
    }

    #[test]
    fn trained_model_serializes_with_kind_tag() {
        let data = test_support::separable(10, 10);
        let mut rng = RngHierarchy::new(7).rng_for("train", "gradient_boosting", 0);
        let model = fit(ModelKind::GradientBoosting, &data, &ModelParams::default(), &mut rng)
            .unwrap();
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("\"kind\":\"gradient_boosting\""));
        let back: TrainedModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), ModelKind::GradientBoosting);
    }
}
