//! Stratified k-fold cross-validation scored by AUC.
//!
//! Rows of each class are shuffled with the family's CV stream and dealt
//! round-robin into `k` folds, so every fold holds both classes whenever each
//! class has at least `k` rows. Each fold is fitted on the remaining rows
//! with its own RNG stream.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::Dataset;
use crate::domain::Label;
use crate::metrics::{mean_std, roc_auc};
use crate::models::{self, Classifier, FitError, ModelKind, ModelParams};
use crate::rng::{stage, RngHierarchy};

// ─── Result types ────────────────────────────────────────────────────

/// Per-family cross-validation outcome. Diagnostic only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvSummary {
    pub folds: usize,
    pub fold_auc: Vec<f64>,
    pub mean_auc: f64,
    /// Population standard deviation of the fold AUCs.
    pub std_auc: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum CvError {
    #[error("cross-validation needs at least 2 folds, got {0}")]
    InvalidFolds(usize),
    #[error("class '{label}' has {count} row(s), fewer than {folds} folds")]
    TooFewRows {
        label: Label,
        count: usize,
        folds: usize,
    },
    #[error("fold {fold} failed to fit: {source}")]
    FoldFailed {
        fold: usize,
        #[source]
        source: FitError,
    },
}

// ─── Fold creation ───────────────────────────────────────────────────

/// Assign every row to one of `k` stratified folds. Returns the held-out
/// row indices of each fold, sorted ascending.
pub fn stratified_folds(
    labels: &[Label],
    k: usize,
    rng: &mut StdRng,
) -> Result<Vec<Vec<usize>>, CvError> {
    if k < 2 {
        return Err(CvError::InvalidFolds(k));
    }
    let mut folds = vec![Vec::new(); k];
    for label in [Label::Legitimate, Label::Fraud] {
        let mut idx: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == label)
            .map(|(i, _)| i)
            .collect();
        if idx.len() < k {
            return Err(CvError::TooFewRows {
                label,
                count: idx.len(),
                folds: k,
            });
        }
        idx.shuffle(rng);
        for (pos, i) in idx.into_iter().enumerate() {
            folds[pos % k].push(i);
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Complement of `held_out` (sorted) within `0..n`.
fn training_rows(n: usize, held_out: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(n - held_out.len());
    let mut skip = held_out.iter().peekable();
    for i in 0..n {
        if skip.peek() == Some(&&i) {
            skip.next();
        } else {
            out.push(i);
        }
    }
    out
}

// ─── Orchestration ───────────────────────────────────────────────────

/// Cross-validate one family on `data`.
pub fn cross_validate(
    kind: ModelKind,
    data: &Dataset,
    params: &ModelParams,
    k: usize,
    rng: &RngHierarchy,
) -> Result<CvSummary, CvError> {
    let mut fold_rng = rng.rng_for(stage::TRAIN, &format!("cv/{}", kind.name()), 0);
    let folds = stratified_folds(data.labels(), k, &mut fold_rng)?;

    let mut fold_auc = Vec::with_capacity(k);
    for (fold, held_out) in folds.iter().enumerate() {
        let train = data.subset(&training_rows(data.len(), held_out));
        let test = data.subset(held_out);
        let mut fit_rng = rng.rng_for(stage::TRAIN, kind.name(), fold as u64 + 1);
        let model = models::fit(kind, &train, params, &mut fit_rng)
            .map_err(|source| CvError::FoldFailed { fold, source })?;
        let scores = model.predict_proba_all(test.rows());
        // Both classes are present in every fold; see `stratified_folds`.
        let auc = roc_auc(&scores, test.labels()).unwrap_or(0.5);
        tracing::debug!(model = kind.name(), fold, auc, "cross-validation fold");
        fold_auc.push(auc);
    }

    let (mean_auc, std_auc) = mean_std(&fold_auc);
    Ok(CvSummary {
        folds: k,
        fold_auc,
        mean_auc,
        std_auc,
    })
}
