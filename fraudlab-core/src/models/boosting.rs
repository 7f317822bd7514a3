//! Gradient boosting on the logistic loss with Newton-step leaves.
//!
//! Starts from the prior log-odds; each round fits a shallow regression tree
//! to the residuals `y - p` and scales its contribution by the learning rate.

use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeConfig, TreeInput};
use super::{normalize, sigmoid, Classifier};
use crate::dataset::Dataset;

/// Prior probabilities are clamped into `[EPS, 1 - EPS]` before the logit.
const EPS: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingConfig {
    pub n_trees: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    init: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    importance: Vec<f64>,
}

impl GradientBoosting {
    pub fn fit(data: &Dataset, config: &BoostingConfig) -> Self {
        let n = data.len();
        let y = data.targets();
        let prior = (y.iter().sum::<f64>() / n.max(1) as f64).clamp(EPS, 1.0 - EPS);
        let init = (prior / (1.0 - prior)).ln();

        let tree_config = TreeConfig {
            max_depth: config.max_depth,
            min_samples_leaf: config.min_samples_leaf,
            max_features: None,
        };
        let weights = vec![1.0; n];
        let mut raw = vec![init; n];
        let mut trees = Vec::with_capacity(config.n_trees);
        let mut importance = vec![0.0; data.feature_count()];

        for _ in 0..config.n_trees {
            let p: Vec<f64> = raw.iter().map(|&f| sigmoid(f)).collect();
            let residuals: Vec<f64> = y.iter().zip(&p).map(|(t, p)| t - p).collect();
            let hessians: Vec<f64> = p.iter().map(|p| p * (1.0 - p)).collect();
            let input = TreeInput {
                rows: data.rows(),
                targets: &residuals,
                weights: &weights,
                hessians: Some(&hessians),
            };
            let tree = RegressionTree::fit(&input, (0..n).collect(), tree_config, None);
            for (f, row) in raw.iter_mut().zip(data.rows()) {
                *f += config.learning_rate * tree.predict(row);
            }
            for (total, v) in importance.iter_mut().zip(tree.importance()) {
                *total += v;
            }
            trees.push(tree);
        }
        normalize(&mut importance);

        tracing::debug!(rounds = trees.len(), init, "gradient boosting fitted");
        Self {
            init,
            learning_rate: config.learning_rate,
            trees,
            importance,
        }
    }

    fn raw_score(&self, row: &[f64]) -> f64 {
        self.init
            + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    pub fn round_count(&self) -> usize {
        self.trees.len()
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.init.is_finite()
            && self.learning_rate.is_finite()
            && self.trees.iter().all(RegressionTree::is_finite)
    }
}

impl Classifier for GradientBoosting {
    fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(self.raw_score(row))
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        Some(self.importance.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::separable;

    #[test]
    fn zero_rounds_predict_the_prior() {
        let config = BoostingConfig {
            n_trees: 0,
            ..BoostingConfig::default()
        };
        let model = GradientBoosting::fit(&separable(30, 10), &config);
        assert!((model.predict_proba(&[5.0, 0.0]) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn rounds_sharpen_predictions() {
        let data = separable(30, 30);
        let short = GradientBoosting::fit(&data, &BoostingConfig { n_trees: 5, ..Default::default() });
        let long = GradientBoosting::fit(&data, &BoostingConfig::default());
        let row = [1.1, 0.5];
        assert!(long.predict_proba(&row) > short.predict_proba(&row));
        assert!(long.predict_proba(&row) > 0.99);
        assert_eq!(long.round_count(), 100);
    }

    #[test]
    fn all_importance_on_separating_feature() {
        let model = GradientBoosting::fit(&separable(20, 20), &BoostingConfig::default());
        let importance = model.feature_importance().unwrap();
        assert!((importance[0] - 1.0).abs() < 1e-9);
        assert_eq!(importance[1], 0.0);
    }
}
