//! Random forest: bootstrap-aggregated CART trees.
//!
//! Each tree draws its own seed from the family's stream before any tree is
//! grown, so trees can be built in parallel with identical results.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeConfig, TreeInput};
use super::{balanced_weights, normalize, Classifier};
use crate::dataset::Dataset;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 12,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    importance: Vec<f64>,
}

impl RandomForest {
    pub fn fit(data: &Dataset, config: &ForestConfig, rng: &mut StdRng) -> Self {
        let n = data.len();
        let features = data.feature_count();
        let targets = data.targets();
        let weights = balanced_weights(data.labels());
        let tree_config = TreeConfig {
            max_depth: config.max_depth,
            min_samples_leaf: config.min_samples_leaf,
            max_features: Some(((features as f64).sqrt().round() as usize).max(1)),
        };
        let input = TreeInput {
            rows: data.rows(),
            targets: &targets,
            weights: &weights,
            hessians: None,
        };

        let seeds: Vec<u64> = (0..config.n_trees.max(1)).map(|_| rng.gen()).collect();
        let trees: Vec<RegressionTree> = seeds
            .into_par_iter()
            .map(|seed| {
                let mut tree_rng = StdRng::seed_from_u64(seed);
                let bootstrap: Vec<usize> = (0..n).map(|_| tree_rng.gen_range(0..n)).collect();
                RegressionTree::fit(&input, bootstrap, tree_config, Some(&mut tree_rng))
            })
            .collect();

        let mut importance = vec![0.0; features];
        for tree in &trees {
            let mut per_tree = tree.importance().to_vec();
            normalize(&mut per_tree);
            for (total, v) in importance.iter_mut().zip(per_tree) {
                *total += v;
            }
        }
        normalize(&mut importance);

        tracing::debug!(trees = trees.len(), "random forest grown");
        Self { trees, importance }
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.trees.iter().all(RegressionTree::is_finite)
    }
}

impl Classifier for RandomForest {
    fn predict_proba(&self, row: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        (sum / self.trees.len() as f64).clamp(0.0, 1.0)
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        Some(self.importance.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::separable;

    fn small() -> ForestConfig {
        ForestConfig {
            n_trees: 15,
            ..ForestConfig::default()
        }
    }

    #[test]
    fn importance_favours_signal_and_sums_to_one() {
        let mut rng = StdRng::seed_from_u64(11);
        let forest = RandomForest::fit(&separable(50, 50), &small(), &mut rng);
        let importance = forest.feature_importance().unwrap();
        assert!((importance.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importance[0] > importance[1]);
    }

    #[test]
    fn same_stream_same_forest() {
        let data = separable(30, 20);
        let a = RandomForest::fit(&data, &small(), &mut StdRng::seed_from_u64(3));
        let b = RandomForest::fit(&data, &small(), &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
        assert_eq!(a.tree_count(), 15);
    }

    #[test]
    fn probabilities_stay_in_unit_interval() {
        let forest = RandomForest::fit(&separable(30, 10), &small(), &mut StdRng::seed_from_u64(1));
        for x in [-3.0, -1.0, 0.0, 1.0, 3.0] {
            let p = forest.predict_proba(&[x, 0.5]);
            assert!((0.0..=1.0).contains(&p));
        }
    }
}
