//! Model trainer: cross-validates and fits every classifier family.
//!
//! Families are independent: each draws from its own RNG streams and a
//! failure in one is logged and excluded without affecting the others. With
//! `parallel` set, families train concurrently on the rayon pool; results are
//! identical either way.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cv::{cross_validate, CvError, CvSummary};
use crate::dataset::Dataset;
use crate::features::{default_model_features, Feature};
use crate::models::{self, Classifier, FitError, ModelKind, ModelParams, TrainedModel};
use crate::rng::{stage, RngHierarchy};

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Folds for stratified cross-validation (default 5).
    pub cv_folds: usize,
    /// Features kept in each importance ranking (default 10).
    pub importance_top_n: usize,
    /// Train families concurrently (default true).
    pub parallel: bool,
    /// Ordered model feature list.
    pub features: Vec<Feature>,
    #[serde(flatten)]
    pub models: ModelParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            cv_folds: 5,
            importance_top_n: 10,
            parallel: true,
            features: default_model_features(),
            models: ModelParams::default(),
        }
    }
}

// ─── Results ─────────────────────────────────────────────────────────

/// One entry of a feature-importance ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFeature {
    /// 1-based rank.
    pub rank: usize,
    pub feature: String,
    pub importance: f64,
}

/// A successfully trained family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedEntry {
    pub kind: ModelKind,
    pub model: TrainedModel,
    /// Absent when cross-validation was skipped.
    pub cv: Option<CvSummary>,
    pub importance: Option<Vec<RankedFeature>>,
}

/// A family excluded from the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFailure {
    pub kind: ModelKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Trained families in enumeration order.
    pub models: Vec<TrainedEntry>,
    pub failures: Vec<ModelFailure>,
}

impl TrainingReport {
    pub fn trained_models(&self) -> Vec<TrainedModel> {
        self.models.iter().map(|e| e.model.clone()).collect()
    }

    pub fn get(&self, kind: ModelKind) -> Option<&TrainedEntry> {
        self.models.iter().find(|e| e.kind == kind)
    }
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("all model families failed to train: {}", summarize(.0))]
    AllModelsFailed(Vec<ModelFailure>),
}

fn summarize(failures: &[ModelFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.kind, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
enum FamilyError {
    #[error("cross-validation failed: {0}")]
    CrossValidation(CvError),
    #[error(transparent)]
    Fit(#[from] FitError),
}

// ─── Training ────────────────────────────────────────────────────────

/// Train every family on the balanced training set.
pub fn train_all(
    data: &Dataset,
    config: &TrainingConfig,
    rng: &RngHierarchy,
) -> Result<TrainingReport, TrainingError> {
    let outcomes: Vec<(ModelKind, Result<TrainedEntry, FamilyError>)> = if config.parallel {
        ModelKind::ALL
            .par_iter()
            .map(|&kind| (kind, train_family(kind, data, config, rng)))
            .collect()
    } else {
        ModelKind::ALL
            .iter()
            .map(|&kind| (kind, train_family(kind, data, config, rng)))
            .collect()
    };

    let mut report = TrainingReport {
        models: Vec::new(),
        failures: Vec::new(),
    };
    for (kind, outcome) in outcomes {
        match outcome {
            Ok(entry) => {
                tracing::info!(
                    model = kind.name(),
                    cv_auc = entry.cv.as_ref().map(|c| c.mean_auc),
                    "model trained"
                );
                report.models.push(entry);
            }
            Err(e) => {
                tracing::warn!(model = kind.name(), error = %e, "model excluded");
                report.failures.push(ModelFailure {
                    kind,
                    reason: e.to_string(),
                });
            }
        }
    }

    if report.models.is_empty() {
        return Err(TrainingError::AllModelsFailed(report.failures));
    }
    Ok(report)
}

fn train_family(
    kind: ModelKind,
    data: &Dataset,
    config: &TrainingConfig,
    rng: &RngHierarchy,
) -> Result<TrainedEntry, FamilyError> {
    let cv = match cross_validate(kind, data, &config.models, config.cv_folds, rng) {
        Ok(summary) => Some(summary),
        Err(CvError::TooFewRows {
            label,
            count,
            folds,
        }) => {
            tracing::warn!(
                model = kind.name(),
                %label,
                count,
                folds,
                "skipping cross-validation: too few rows"
            );
            None
        }
        Err(e) => return Err(FamilyError::CrossValidation(e)),
    };

    let mut fit_rng = rng.rng_for(stage::TRAIN, kind.name(), 0);
    let model = models::fit(kind, data, &config.models, &mut fit_rng)?;
    let importance = model
        .feature_importance()
        .map(|values| rank_importance(data.feature_names(), &values, config.importance_top_n));

    Ok(TrainedEntry {
        kind,
        model,
        cv,
        importance,
    })
}

/// Top `top_n` features by importance, descending. Equal importances keep
/// feature-list order.
pub fn rank_importance(names: &[String], values: &[f64], top_n: usize) -> Vec<RankedFeature> {
    let mut order: Vec<usize> = (0..values.len().min(names.len())).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    order
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(pos, i)| RankedFeature {
            rank: pos + 1,
            feature: names[i].clone(),
            importance: values[i],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::separable;

    fn quick_config(parallel: bool) -> TrainingConfig {
        let mut config = TrainingConfig {
            parallel,
            ..TrainingConfig::default()
        };
        config.models.forest.n_trees = 10;
        config.models.boosting.n_trees = 20;
        config
    }

    #[test]
    fn ranking_is_descending_with_stable_ties() {
        let names: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let ranked = rank_importance(&names, &[0.2, 0.4, 0.2, 0.2], 3);
        let order: Vec<&str> = ranked.iter().map(|r| r.feature.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn trains_every_family_in_order() {
        let report = train_all(&separable(40, 20), &quick_config(false), &RngHierarchy::new(42)).unwrap();
        let kinds: Vec<ModelKind> = report.models.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, ModelKind::ALL.to_vec());
        assert!(report.failures.is_empty());
        assert!(report.get(ModelKind::LogisticRegression).unwrap().importance.is_none());
        assert!(report.get(ModelKind::RandomForest).unwrap().importance.is_some());
    }

    #[test]
    fn parallel_matches_sequential() {
        let data = separable(40, 20);
        let rng = RngHierarchy::new(42);
        let sequential = train_all(&data, &quick_config(false), &rng).unwrap();
        let parallel = train_all(&data, &quick_config(true), &rng).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn cross_validation_skipped_for_tiny_minority() {
        let report = train_all(&separable(40, 3), &quick_config(false), &RngHierarchy::new(1)).unwrap();
        assert!(report.models.iter().all(|e| e.cv.is_none()));
    }

    #[test]
    fn single_class_fails_every_family() {
        let err = train_all(&separable(20, 0), &quick_config(false), &RngHierarchy::new(1)).unwrap_err();
        let TrainingError::AllModelsFailed(failures) = err;
        assert_eq!(failures.len(), 3);
    }
}
