//! Class-weighted logistic regression fitted by batch gradient descent.

use serde::{Deserialize, Serialize};

use super::{balanced_weights, sigmoid, Classifier};
use crate::dataset::Dataset;

/// Columns with a standard deviation below this are left unscaled.
const MIN_SCALE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticConfig {
    pub max_iter: usize,
    pub learning_rate: f64,
    pub l2: f64,
    /// Stop once no parameter moves by more than this in one step.
    pub tolerance: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            learning_rate: 0.1,
            l2: 1e-4,
            tolerance: 1e-6,
        }
    }
}

/// Fitted coefficients on standardized inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    means: Vec<f64>,
    scales: Vec<f64>,
    coefficients: Vec<f64>,
    intercept: f64,
    iterations: usize,
}

impl LogisticModel {
    pub fn fit(data: &Dataset, config: &LogisticConfig) -> Self {
        let (means, scales) = column_scaling(data.rows());
        let x: Vec<Vec<f64>> = data
            .rows()
            .iter()
            .map(|row| standardize(row, &means, &scales))
            .collect();
        let y = data.targets();
        let w = balanced_weights(data.labels());
        let total_w: f64 = w.iter().sum();

        let features = data.feature_count();
        let mut coefficients = vec![0.0; features];
        let mut intercept = 0.0;
        let mut iterations = 0;

        for _ in 0..config.max_iter {
            iterations += 1;
            let mut grad = vec![0.0; features];
            let mut grad_b = 0.0;
            for ((row, &target), &weight) in x.iter().zip(&y).zip(&w) {
                let p = sigmoid(intercept + dot(&coefficients, row));
                let err = weight * (p - target);
                grad_b += err;
                for (g, v) in grad.iter_mut().zip(row) {
                    *g += err * v;
                }
            }

            let mut largest_step = (config.learning_rate * grad_b / total_w).abs();
            intercept -= config.learning_rate * grad_b / total_w;
            for (beta, g) in coefficients.iter_mut().zip(&grad) {
                let step = config.learning_rate * (g / total_w + config.l2 * *beta);
                *beta -= step;
                largest_step = largest_step.max(step.abs());
            }
            if largest_step < config.tolerance {
                break;
            }
        }

        tracing::debug!(iterations, intercept, "logistic regression converged");
        Self {
            means,
            scales,
            coefficients,
            intercept,
            iterations,
        }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.intercept.is_finite() && self.coefficients.iter().all(|c| c.is_finite())
    }
}

impl Classifier for LogisticModel {
    fn predict_proba(&self, row: &[f64]) -> f64 {
        let z = self.intercept + dot(&self.coefficients, &standardize(row, &self.means, &self.scales));
        sigmoid(z)
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        None
    }
}

fn column_scaling(rows: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    let n = rows.len().max(1) as f64;
    let width = rows.first().map_or(0, Vec::len);
    let mut means = vec![0.0; width];
    for row in rows {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v / n;
        }
    }
    let mut scales = vec![0.0; width];
    for row in rows {
        for ((s, v), m) in scales.iter_mut().zip(row).zip(&means) {
            *s += (v - m).powi(2) / n;
        }
    }
    for s in &mut scales {
        *s = s.sqrt();
        if *s < MIN_SCALE {
            *s = 1.0;
        }
    }
    (means, scales)
}

fn standardize(row: &[f64], means: &[f64], scales: &[f64]) -> Vec<f64> {
    row.iter()
        .zip(means)
        .zip(scales)
        .map(|((v, m), s)| (v - m) / s)
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
