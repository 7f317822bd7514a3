//! Pipeline driver: wires the core stages together and tags failures.
//!
//! Two entry points:
//! - `run_pipeline()`: pure computation over loaded records. No I/O.
//! - `run_from_files()`: loads the raw CSV, reuses or derives feature
//!   statistics, runs the pipeline, and persists every artifact.

use std::fmt;

use chrono::Utc;
use thiserror::Error;

use fraudlab_core::balance::{BalanceError, ClassBalancer};
use fraudlab_core::dataset::Dataset;
use fraudlab_core::domain::Transaction;
use fraudlab_core::evaluate::{evaluate_models, score, select_best, EvaluationError};
use fraudlab_core::features::{prepare, FeatureError, FeatureStats};
use fraudlab_core::fingerprint::{DatasetHash, RunId};
use fraudlab_core::profile::DataProfile;
use fraudlab_core::rng::RngHierarchy;
use fraudlab_core::split::{stratified_split, SplitError};
use fraudlab_core::train::{train_all, TrainingError};

use crate::artifacts::{ArtifactManager, ArtifactPaths};
use crate::config::{ConfigError, PipelineConfig};
use crate::data_loader::{load_transactions, LoadError};
use crate::result::{ModelMetadata, PipelineOutcome, Prediction, SelectedModel};

// ─── Stages and errors ───────────────────────────────────────────────

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Load,
    FeaturePreparation,
    Split,
    Balance,
    Training,
    Evaluation,
    Persist,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::Load => "load",
            Stage::FeaturePreparation => "feature_preparation",
            Stage::Split => "split",
            Stage::Balance => "balance",
            Stage::Training => "training",
            Stage::Evaluation => "evaluation",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stage failure, rendered as `"<stage>: <cause>"`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("load: {0}")]
    Load(#[from] LoadError),
    #[error("feature_preparation: {0}")]
    Features(#[from] FeatureError),
    #[error("split: {0}")]
    Split(#[from] SplitError),
    #[error("balance: {0}")]
    Balance(#[from] BalanceError),
    #[error("training: {0}")]
    Training(#[from] TrainingError),
    #[error("evaluation: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("persist: {0:#}")]
    Persist(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Config(_) => Stage::Config,
            PipelineError::Load(_) => Stage::Load,
            PipelineError::Features(_) => Stage::FeaturePreparation,
            PipelineError::Split(_) => Stage::Split,
            PipelineError::Balance(_) => Stage::Balance,
            PipelineError::Training(_) => Stage::Training,
            PipelineError::Evaluation(_) => Stage::Evaluation,
            PipelineError::Persist(_) => Stage::Persist,
        }
    }
}

// ─── Pure pipeline ───────────────────────────────────────────────────

/// Run every stage over `records`.
///
/// `stats` are reused when given; otherwise they are fitted over all records.
pub fn run_pipeline(
    config: &PipelineConfig,
    records: &[Transaction],
    stats: Option<FeatureStats>,
) -> Result<PipelineOutcome, PipelineError> {
    config.validate()?;
    let dataset_hash = DatasetHash::of_transactions(records);
    let run_id = RunId::new(config.config_hash()?, dataset_hash, config.seed);
    tracing::info!(run_id = %run_id, rows = records.len(), seed = config.seed, "pipeline started");

    let stats = match stats {
        Some(stats) => stats,
        None => FeatureStats::fit(records)?,
    };
    let prepared = prepare(records, &stats)?;

    let rng = RngHierarchy::new(config.seed);
    let split = stratified_split(&prepared, &config.split, &rng)?;
    let (train_counts, test_counts) = (split.train_counts(), split.test_counts());
    tracing::debug!(
        train_fraud = train_counts.fraud,
        train_legitimate = train_counts.legitimate,
        test_fraud = test_counts.fraud,
        test_legitimate = test_counts.legitimate,
        "partition class counts"
    );
    let features = &config.training.features;
    let train = Dataset::from_prepared(&split.train, features);
    let test = Dataset::from_prepared(&split.test, features);

    let balanced = ClassBalancer::new(config.balance.clone(), rng.clone()).balance(&train)?;
    let training = train_all(&balanced.dataset, &config.training, &rng)?;

    let evaluations = evaluate_models(&training.trained_models(), &test, &config.evaluation)?;
    let best = select_best(&evaluations)?.clone();
    let model = training
        .get(best.kind)
        .map(|entry| entry.model.clone())
        .ok_or(EvaluationError::NoModelsToEvaluate)?;

    let (proba, predicted) = score(&model, &test, config.evaluation.fraud_threshold);
    let predictions = test
        .ids()
        .iter()
        .zip(test.labels())
        .zip(proba.into_iter().zip(predicted))
        .map(|((&id, &actual), (proba, predicted))| Prediction {
            id,
            actual,
            proba,
            predicted,
        })
        .collect();

    let metadata = ModelMetadata {
        model_name: best.kind,
        training_timestamp: Utc::now(),
        auc: best.auc,
        precision: best.precision,
        recall: best.recall,
        f1: best.f1,
        feature_count: test.feature_count(),
        dataset_hash: run_id.dataset_hash.to_string(),
        config_hash: run_id.config_hash.to_string(),
        seed: config.seed,
        run_id: run_id.digest(),
    };
    tracing::info!(
        run_id = %run_id,
        model = best.kind.name(),
        auc = best.auc,
        "pipeline finished"
    );

    Ok(PipelineOutcome {
        run_id,
        stats,
        prepared,
        feature_names: test.feature_names().to_vec(),
        split,
        balance: balanced.report,
        balanced_ids: balanced.dataset.ids().to_vec(),
        training,
        evaluations,
        selected: SelectedModel {
            model,
            evaluation: best,
        },
        predictions,
        metadata,
    })
}

// ─── File-backed run ─────────────────────────────────────────────────

/// A completed file-backed run.
#[derive(Debug)]
pub struct RunSummary {
    pub outcome: PipelineOutcome,
    pub profile: DataProfile,
    pub artifacts: ArtifactPaths,
    /// Whether feature statistics came from a previous run's artifact.
    pub stats_reused: bool,
}

/// Load the configured raw CSV, run the pipeline, and persist all artifacts.
pub fn run_from_files(config: &PipelineConfig) -> Result<RunSummary, PipelineError> {
    config.validate()?;
    let loaded = load_transactions(&config.paths.raw_data)?;
    let artifacts = ArtifactManager::new(&config.paths)?;

    let profile = DataProfile::build(&loaded.records)?;
    artifacts.write_profile(&profile)?;

    let cached = artifacts.load_feature_stats(&loaded.dataset_hash)?;
    let stats_reused = cached.is_some();
    let stats = match cached {
        Some(stats) => {
            tracing::info!("reusing feature statistics from a previous run");
            stats
        }
        None => {
            let stats = FeatureStats::fit(&loaded.records)?;
            artifacts.save_feature_stats(&stats, &loaded.dataset_hash)?;
            stats
        }
    };

    let outcome = run_pipeline(config, &loaded.records, Some(stats))?;
    let paths = artifacts.save_run(&outcome)?;

    Ok(RunSummary {
        outcome,
        profile,
        artifacts: paths,
        stats_reused,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudlab_core::domain::{Label, COMPONENT_COUNT};

    fn records(legit: usize, fraud: usize) -> Vec<Transaction> {
        (0..legit + fraud)
            .map(|i| {
                let is_fraud = i >= legit;
                let mut components = [0.0; COMPONENT_COUNT];
                components[0] = if is_fraud { 5.0 } else { -5.0 };
                for (j, c) in components.iter_mut().enumerate().skip(1) {
                    *c = (((i * 7 + j * 3) % 19) as f64 - 9.0) / 1000.0;
                }
                Transaction {
                    id: i,
                    time: i as f64 * 60.0,
                    components,
                    amount: 10.0 + (i % 50) as f64,
                    label: if is_fraud { Label::Fraud } else { Label::Legitimate },
                }
            })
            .collect()
    }

    fn quick_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.training.models.forest.n_trees = 10;
        config.training.models.boosting.n_trees = 20;
        config
    }

    #[test]
    fn stage_names_prefix_errors() {
        let err = run_pipeline(&quick_config(), &records(100, 1), None).unwrap_err();
        assert_eq!(err.stage(), Stage::Split);
        assert!(err.to_string().starts_with("split: "));
    }

    #[test]
    fn empty_input_fails_in_feature_preparation() {
        let err = run_pipeline(&quick_config(), &[], None).unwrap_err();
        assert_eq!(err.stage(), Stage::FeaturePreparation);
    }

    #[test]
    fn degenerate_minority_fails_in_balance() {
        // 3 fraud rows: 1 goes to test, 2 stay in train with a single neighbour.
        let err = run_pipeline(&quick_config(), &records(200, 3), None).unwrap_err();
        assert_eq!(err.stage(), Stage::Balance);
    }

    #[test]
    fn invalid_config_fails_before_any_stage() {
        let mut config = quick_config();
        config.training.cv_folds = 1;
        let err = run_pipeline(&config, &records(100, 10), None).unwrap_err();
        assert_eq!(err.stage(), Stage::Config);
    }

    #[test]
    fn predictions_cover_the_test_partition() {
        let outcome = run_pipeline(&quick_config(), &records(300, 20), None).unwrap();
        assert_eq!(outcome.predictions.len(), outcome.split.test.len());
        for (p, r) in outcome.predictions.iter().zip(&outcome.split.test) {
            assert_eq!(p.id.record(), Some(r.transaction.id));
        }
    }
}
