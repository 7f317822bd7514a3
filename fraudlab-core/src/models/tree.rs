//! Weighted CART regression tree shared by the forest and boosting families.
//!
//! Splits minimize the weighted sum of squared errors. For 0/1 targets this
//! is equivalent to Gini impurity. Leaves predict either the weighted mean
//! target or, when hessians are supplied, the Newton step `Σwg / Σwh`.
//! Nodes are stored in an arena indexed from the root at 0.

use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

/// Minimum impurity decrease for a split to be kept.
const MIN_GAIN: f64 = 1e-10;
/// Nodes at or below this weighted SSE are pure.
const PURE_SSE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Features sampled per split; `None` considers all of them.
    pub max_features: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    /// Raw weighted impurity decrease per feature.
    importance: Vec<f64>,
}

/// Borrowed training inputs for one tree.
pub struct TreeInput<'a> {
    pub rows: &'a [Vec<f64>],
    pub targets: &'a [f64],
    pub weights: &'a [f64],
    pub hessians: Option<&'a [f64]>,
}

struct Builder<'a> {
    input: &'a TreeInput<'a>,
    config: TreeConfig,
    feature_count: usize,
    rng: Option<&'a mut StdRng>,
    nodes: Vec<Node>,
    importance: Vec<f64>,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

#[derive(Default, Clone, Copy)]
struct Moments {
    w: f64,
    wy: f64,
    wy2: f64,
    count: usize,
}

impl Moments {
    fn add(&mut self, w: f64, y: f64) {
        self.w += w;
        self.wy += w * y;
        self.wy2 += w * y * y;
        self.count += 1;
    }

    fn minus(&self, other: &Moments) -> Moments {
        Moments {
            w: self.w - other.w,
            wy: self.wy - other.wy,
            wy2: self.wy2 - other.wy2,
            count: self.count - other.count,
        }
    }

    fn sse(&self) -> f64 {
        if self.w <= 0.0 {
            return 0.0;
        }
        (self.wy2 - self.wy * self.wy / self.w).max(0.0)
    }
}

impl RegressionTree {
    /// Grow a tree over `samples` (row indices, duplicates allowed).
    ///
    /// `rng` is required only when `config.max_features` restricts the
    /// candidate features.
    pub fn fit(
        input: &TreeInput<'_>,
        samples: Vec<usize>,
        config: TreeConfig,
        rng: Option<&mut StdRng>,
    ) -> Self {
        let feature_count = input.rows.first().map_or(0, Vec::len);
        let mut builder = Builder {
            input,
            config,
            feature_count,
            rng,
            nodes: Vec::new(),
            importance: vec![0.0; feature_count],
        };
        builder.grow(samples, 0);
        RegressionTree {
            nodes: builder.nodes,
            importance: builder.importance,
        }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    at = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn importance(&self) -> &[f64] {
        &self.importance
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], at: usize) -> usize {
            match &nodes[at] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }

    pub fn is_finite(&self) -> bool {
        self.nodes.iter().all(|n| match n {
            Node::Leaf { value } => value.is_finite(),
            Node::Split { threshold, .. } => threshold.is_finite(),
        })
    }
}

impl Builder<'_> {
    /// Returns the index of the node grown for `samples`.
    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let at = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.leaf_value(&samples),
        });

        let parent = self.moments(&samples);
        if depth >= self.config.max_depth
            || samples.len() < 2 * self.config.min_samples_leaf.max(1)
            || parent.sse() <= PURE_SSE
        {
            return at;
        }

        let Some(best) = self.best_split(&samples, &parent) else {
            return at;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.input.rows[i][best.feature] <= best.threshold);
        self.importance[best.feature] += best.gain;

        let left_at = self.grow(left, depth + 1);
        let right_at = self.grow(right, depth + 1);
        self.nodes[at] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: left_at,
            right: right_at,
        };
        at
    }

    fn moments(&self, samples: &[usize]) -> Moments {
        let mut m = Moments::default();
        for &i in samples {
            m.add(self.input.weights[i], self.input.targets[i]);
        }
        m
    }

    fn leaf_value(&self, samples: &[usize]) -> f64 {
        let w = self.input.weights;
        let y = self.input.targets;
        let num: f64 = samples.iter().map(|&i| w[i] * y[i]).sum();
        let den: f64 = match self.input.hessians {
            Some(h) => samples.iter().map(|&i| w[i] * h[i]).sum(),
            None => samples.iter().map(|&i| w[i]).sum(),
        };
        if den.abs() < f64::MIN_POSITIVE {
            0.0
        } else {
            num / den
        }
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        match (self.config.max_features, self.rng.as_deref_mut()) {
            (Some(k), Some(rng)) if k < self.feature_count => {
                let mut picked = index::sample(rng, self.feature_count, k).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..self.feature_count).collect(),
        }
    }

    fn best_split(&mut self, samples: &[usize], parent: &Moments) -> Option<Candidate> {
        let rows = self.input.rows;
        let min_leaf = self.config.min_samples_leaf.max(1);
        let parent_sse = parent.sse();
        let mut best: Option<Candidate> = None;

        for feature in self.candidate_features() {
            let mut order = samples.to_vec();
            order.sort_by(|&a, &b| rows[a][feature].total_cmp(&rows[b][feature]));

            let mut left = Moments::default();
            for pos in 0..order.len() - 1 {
                let i = order[pos];
                left.add(self.input.weights[i], self.input.targets[i]);

                let here = rows[i][feature];
                let next = rows[order[pos + 1]][feature];
                if here == next || left.count < min_leaf || order.len() - left.count < min_leaf {
                    continue;
                }

                let right = parent.minus(&left);
                let gain = parent_sse - left.sse() - right.sse();
                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mid = here + (next - here) / 2.0;
                    let threshold = if mid < next { mid } else { here };
                    best = Some(Candidate {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn input<'a>(rows: &'a [Vec<f64>], targets: &'a [f64], weights: &'a [f64]) -> TreeInput<'a> {
        TreeInput {
            rows,
            targets,
            weights,
            hessians: None,
        }
    }

    fn config(max_depth: usize) -> TreeConfig {
        TreeConfig {
            max_depth,
            min_samples_leaf: 1,
            max_features: None,
        }
    }

    #[test]
    fn single_split_separates_step() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..10).map(|i| if i < 5 { 0.0 } else { 1.0 }).collect();
        let weights = vec![1.0; 10];
        let tree = RegressionTree::fit(&input(&rows, &targets, &weights), (0..10).collect(), config(4), None);
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.predict(&[2.0]), 0.0);
        assert_eq!(tree.predict(&[7.0]), 1.0);
        assert_eq!(tree.predict(&[4.5]), 0.0);
        assert!(tree.importance()[0] > 0.0);
    }

    #[test]
    fn depth_limit_is_respected() {
        let rows: Vec<Vec<f64>> = (0..32).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..32).map(|i| (i % 2) as f64).collect();
        let weights = vec![1.0; 32];
        let tree = RegressionTree::fit(&input(&rows, &targets, &weights), (0..32).collect(), config(3), None);
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn constant_targets_make_a_leaf() {
        let rows: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let targets = vec![1.0; 6];
        let weights = vec![1.0; 6];
        let tree = RegressionTree::fit(&input(&rows, &targets, &weights), (0..6).collect(), config(5), None);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&[3.0]), 1.0);
    }

    #[test]
    fn weights_shift_leaf_values() {
        let rows = vec![vec![0.0], vec![0.0]];
        let targets = vec![0.0, 1.0];
        let weights = vec![1.0, 3.0];
        let tree = RegressionTree::fit(&input(&rows, &targets, &weights), vec![0, 1], config(2), None);
        assert!((tree.predict(&[0.0]) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn newton_leaves_divide_by_hessian() {
        let rows = vec![vec![0.0], vec![0.0]];
        let targets = vec![0.5, 0.5];
        let weights = vec![1.0, 1.0];
        let hessians = vec![0.25, 0.25];
        let input = TreeInput {
            rows: &rows,
            targets: &targets,
            weights: &weights,
            hessians: Some(&hessians),
        };
        let tree = RegressionTree::fit(&input, vec![0, 1], config(2), None);
        assert!((tree.predict(&[0.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn min_samples_leaf_blocks_small_children() {
        let rows: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64]).collect();
        let targets = vec![1.0, 0.0, 0.0, 0.0];
        let weights = vec![1.0; 4];
        let cfg = TreeConfig {
            max_depth: 4,
            min_samples_leaf: 2,
            max_features: None,
        };
        let tree = RegressionTree::fit(&input(&rows, &targets, &weights), (0..4).collect(), cfg, None);
        // The only admissible split is 2|2.
        assert_eq!(tree.node_count(), 3);
        assert!((tree.predict(&[0.0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn feature_sampling_is_seeded() {
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![i as f64, (20 - i) as f64, (i % 3) as f64])
            .collect();
        let targets: Vec<f64> = (0..20).map(|i| if i < 10 { 0.0 } else { 1.0 }).collect();
        let weights = vec![1.0; 20];
        let cfg = TreeConfig {
            max_depth: 3,
            min_samples_leaf: 1,
            max_features: Some(1),
        };
        let grow = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            RegressionTree::fit(&input(&rows, &targets, &weights), (0..20).collect(), cfg, Some(&mut rng))
        };
        assert_eq!(grow(5), grow(5));
    }
}
