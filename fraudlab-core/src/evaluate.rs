//! Model evaluator and selector.
//!
//! Scores every trained model on the untouched test partition and picks the
//! one with the strictly highest AUC. Equal AUCs resolve to the family that
//! comes first in `ModelKind::ALL`, whatever order the results arrive in.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::Dataset;
use crate::domain::Label;
use crate::metrics::{roc_auc, ConfusionMatrix};
use crate::models::{Classifier, ModelKind, TrainedModel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Probability at or above which a row is predicted fraud (default 0.5).
    pub fraud_threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            fraud_threshold: 0.5,
        }
    }
}

/// Test-set metrics for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub kind: ModelKind,
    pub auc: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion: ConfusionMatrix,
}

#[derive(Debug, Error, PartialEq)]
pub enum EvaluationError {
    #[error("no models to evaluate")]
    NoModelsToEvaluate,
    #[error("AUC is undefined: the test set holds {legitimate} legitimate and {fraud} fraud row(s)")]
    UndefinedAuc { legitimate: usize, fraud: usize },
}

/// Predicted probabilities and labels for every test row.
pub fn score(model: &TrainedModel, test: &Dataset, threshold: f64) -> (Vec<f64>, Vec<Label>) {
    let proba = model.predict_proba_all(test.rows());
    let labels = proba
        .iter()
        .map(|&p| if p >= threshold { Label::Fraud } else { Label::Legitimate })
        .collect();
    (proba, labels)
}

pub fn evaluate_model(
    model: &TrainedModel,
    test: &Dataset,
    config: &EvaluationConfig,
) -> Result<EvaluationResult, EvaluationError> {
    let (proba, predicted) = score(model, test, config.fraud_threshold);
    let auc = roc_auc(&proba, test.labels()).ok_or_else(|| {
        let counts = test.class_counts();
        EvaluationError::UndefinedAuc {
            legitimate: counts.legitimate,
            fraud: counts.fraud,
        }
    })?;
    let confusion = ConfusionMatrix::from_predictions(&predicted, test.labels());
    let result = EvaluationResult {
        kind: model.kind(),
        auc,
        precision: confusion.precision(),
        recall: confusion.recall(),
        f1: confusion.f1(),
        confusion,
    };
    tracing::info!(
        model = result.kind.name(),
        auc = result.auc,
        precision = result.precision,
        recall = result.recall,
        f1 = result.f1,
        "model evaluated"
    );
    Ok(result)
}

/// Evaluate every model, in the order given.
pub fn evaluate_models(
    models: &[TrainedModel],
    test: &Dataset,
    config: &EvaluationConfig,
) -> Result<Vec<EvaluationResult>, EvaluationError> {
    if models.is_empty() {
        return Err(EvaluationError::NoModelsToEvaluate);
    }
    models
        .iter()
        .map(|m| evaluate_model(m, test, config))
        .collect()
}

/// The result with the strictly highest AUC; ties go to the earlier family.
pub fn select_best(results: &[EvaluationResult]) -> Result<&EvaluationResult, EvaluationError> {
    let mut ordered: Vec<&EvaluationResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.kind.order());

    let mut best: Option<&EvaluationResult> = None;
    for result in ordered {
        if best.map_or(true, |b| result.auc > b.auc) {
            best = Some(result);
        }
    }
    let best = best.ok_or(EvaluationError::NoModelsToEvaluate)?;
    tracing::info!(model = best.kind.name(), auc = best.auc, "selected best model");
    Ok(best)
}
