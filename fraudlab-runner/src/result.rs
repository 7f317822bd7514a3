//! Result types of one pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fraudlab_core::balance::BalanceReport;
use fraudlab_core::domain::{Label, SampleId};
use fraudlab_core::evaluate::EvaluationResult;
use fraudlab_core::features::{FeatureStats, PreparedRecord};
use fraudlab_core::fingerprint::RunId;
use fraudlab_core::models::{ModelKind, TrainedModel};
use fraudlab_core::split::TrainTestSplit;
use fraudlab_core::train::TrainingReport;

/// Current schema version for persisted JSON artifacts.
pub const SCHEMA_VERSION: u32 = 1;

pub(crate) fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Metadata persisted next to the selected model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_name: ModelKind,
    /// UTC, serialized as RFC 3339.
    pub training_timestamp: DateTime<Utc>,
    pub auc: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub feature_count: usize,
    pub dataset_hash: String,
    pub config_hash: String,
    pub seed: u64,
    pub run_id: String,
}

/// The winning model and its test-set metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedModel {
    pub model: TrainedModel,
    pub evaluation: EvaluationResult,
}

/// The selected model's verdict on one test row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: SampleId,
    pub actual: Label,
    pub proba: f64,
    pub predicted: Label,
}

impl Prediction {
    pub fn is_false_positive(&self) -> bool {
        self.predicted.is_fraud() && !self.actual.is_fraud()
    }

    pub fn is_false_negative(&self) -> bool {
        !self.predicted.is_fraud() && self.actual.is_fraud()
    }
}

/// Everything a pipeline run computes, before persistence.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: RunId,
    pub stats: FeatureStats,
    pub prepared: Vec<PreparedRecord>,
    pub split: TrainTestSplit<PreparedRecord>,
    pub feature_names: Vec<String>,
    pub balance: BalanceReport,
    /// Identities of the balanced training rows, in training order.
    pub balanced_ids: Vec<SampleId>,
    pub training: TrainingReport,
    /// Test-set results in enumeration order.
    pub evaluations: Vec<EvaluationResult>,
    pub selected: SelectedModel,
    /// Aligned with `split.test`.
    pub predictions: Vec<Prediction>,
    pub metadata: ModelMetadata,
}
