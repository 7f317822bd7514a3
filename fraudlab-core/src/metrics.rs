//! Binary classification metrics for the fraud class.
//!
//! AUC is rank-based (Mann-Whitney U) with tied scores sharing their average
//! rank. Precision, recall and F1 are reported as 0 when undefined.

use serde::{Deserialize, Serialize};

use crate::domain::Label;

/// Area under the ROC curve, or `None` when either class is absent.
pub fn roc_auc(scores: &[f64], labels: &[Label]) -> Option<f64> {
    assert_eq!(scores.len(), labels.len(), "scores/labels length mismatch");
    let positives = labels.iter().filter(|l| l.is_fraud()).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; the group spans ranks start+1 ..= end.
        let average_rank = (start + 1 + end) as f64 / 2.0;
        let fraud_in_group = order[start..end]
            .iter()
            .filter(|&&i| labels[i].is_fraud())
            .count();
        rank_sum += average_rank * fraud_in_group as f64;
        start = end;
    }

    let p = positives as f64;
    let u = rank_sum - p * (p + 1.0) / 2.0;
    Some(u / (p * negatives as f64))
}

/// 2x2 confusion matrix with fraud as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(predicted: &[Label], actual: &[Label]) -> Self {
        assert_eq!(predicted.len(), actual.len(), "predicted/actual length mismatch");
        let mut m = Self::default();
        for (p, a) in predicted.iter().zip(actual) {
            match (p.is_fraud(), a.is_fraud()) {
                (false, false) => m.tn += 1,
                (true, false) => m.fp += 1,
                (false, true) => m.fn_ += 1,
                (true, true) => m.tp += 1,
            }
        }
        m
    }

    /// `[[tn, fp], [fn, tp]]`.
    pub fn as_matrix(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Mean and population standard deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}
