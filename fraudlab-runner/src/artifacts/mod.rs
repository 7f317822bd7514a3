//! Artifact manager for persisting run outputs.

mod analysis;
mod datasets;
mod exports;
mod models;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use fraudlab_core::features::FeatureStats;
use fraudlab_core::fingerprint::DatasetHash;
use fraudlab_core::profile::DataProfile;

use crate::config::PathsConfig;
use crate::result::PipelineOutcome;

pub use datasets::StatsArtifact;
pub use exports::{transaction_hour, AmountRange, RiskBin, RiskCategory};
pub use models::{load_model, ModelArtifact};

pub const CLEANED_CSV: &str = "creditcard_cleaned.csv";
pub const TRAIN_CSV: &str = "creditcard_train.csv";
pub const TEST_CSV: &str = "creditcard_test.csv";
pub const FEATURE_STATS_JSON: &str = "feature_stats.json";
pub const SELECTED_MODEL_JSON: &str = "fraud_detection_model.json";
pub const PROFILE_JSON: &str = "data_profile.json";

/// Artifact paths returned after a run is saved.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub cleaned_csv: PathBuf,
    pub train_csv: PathBuf,
    pub test_csv: PathBuf,
    /// One per trained family, in enumeration order.
    pub models: Vec<PathBuf>,
    pub selected_model: PathBuf,
    pub model_info_csv: PathBuf,
    pub model_info_json: PathBuf,
    pub importance_csv: Vec<PathBuf>,
    pub comparison_csv: PathBuf,
    pub cross_validation_csv: PathBuf,
    pub confusion_json: PathBuf,
    pub sql_export: PathBuf,
    pub excel_export: PathBuf,
    pub powerbi_export: PathBuf,
    pub fraud_by_hour_csv: PathBuf,
    pub risk_summary_csv: PathBuf,
    pub amount_distribution_csv: PathBuf,
}

/// Manages writing all artifacts for a run.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    paths: PathsConfig,
}

impl ArtifactManager {
    /// Create every output directory.
    pub fn new(paths: &PathsConfig) -> Result<Self> {
        for dir in [
            &paths.processed_dir,
            &paths.models_dir,
            &paths.analysis_dir,
            &paths.reports_dir,
            &paths.exports_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create artifact directory {}", dir.display()))?;
        }
        Ok(Self {
            paths: paths.clone(),
        })
    }

    pub fn feature_stats_path(&self) -> PathBuf {
        self.paths.processed_dir.join(FEATURE_STATS_JSON)
    }

    /// Statistics saved by an earlier run over the same dataset, if any.
    pub fn load_feature_stats(&self, dataset_hash: &DatasetHash) -> Result<Option<FeatureStats>> {
        datasets::load_feature_stats(&self.feature_stats_path(), dataset_hash)
    }

    pub fn save_feature_stats(&self, stats: &FeatureStats, dataset_hash: &DatasetHash) -> Result<PathBuf> {
        let path = self.feature_stats_path();
        datasets::write_feature_stats(&path, stats, dataset_hash)?;
        Ok(path)
    }

    pub fn write_profile(&self, profile: &DataProfile) -> Result<PathBuf> {
        let path = self.paths.reports_dir.join(PROFILE_JSON);
        analysis::write_profile_json(&path, profile)?;
        Ok(path)
    }

    /// Save every artifact of a finished run.
    pub fn save_run(&self, outcome: &PipelineOutcome) -> Result<ArtifactPaths> {
        let processed = &self.paths.processed_dir;
        let cleaned_csv = processed.join(CLEANED_CSV);
        let train_csv = processed.join(TRAIN_CSV);
        let test_csv = processed.join(TEST_CSV);
        datasets::write_prepared_csv(&cleaned_csv, &outcome.prepared)?;
        datasets::write_prepared_csv(&train_csv, &outcome.split.train)?;
        datasets::write_prepared_csv(&test_csv, &outcome.split.test)?;

        let models_dir = &self.paths.models_dir;
        let mut model_paths = Vec::with_capacity(outcome.training.models.len());
        for entry in &outcome.training.models {
            let path = models_dir.join(format!("{}.json", entry.kind.name()));
            models::write_model_json(&path, &entry.model, &outcome.feature_names)?;
            model_paths.push(path);
        }
        let selected_model = models_dir.join(SELECTED_MODEL_JSON);
        models::write_model_json(&selected_model, &outcome.selected.model, &outcome.feature_names)?;

        let model_info_csv = models_dir.join("model_info.csv");
        let model_info_json = models_dir.join("model_info.json");
        models::write_metadata_csv(&model_info_csv, &outcome.metadata)?;
        models::write_metadata_json(&model_info_json, &outcome.metadata)?;

        let analysis_dir = &self.paths.analysis_dir;
        let mut importance_csv = Vec::new();
        for entry in &outcome.training.models {
            if let Some(ranked) = &entry.importance {
                let path = analysis_dir.join(format!("{}_feature_importance.csv", entry.kind.name()));
                analysis::write_importance_csv(&path, ranked)?;
                importance_csv.push(path);
            }
        }
        let comparison_csv = analysis_dir.join("model_comparison.csv");
        analysis::write_comparison_csv(&comparison_csv, &outcome.evaluations)?;
        let cross_validation_csv = analysis_dir.join("cross_validation.csv");
        analysis::write_cross_validation_csv(&cross_validation_csv, &outcome.training.models)?;
        let confusion_json = analysis_dir.join("confusion_matrices.json");
        analysis::write_confusion_json(&confusion_json, &outcome.evaluations)?;

        let exports_dir = &self.paths.exports_dir;
        let sql_export = exports_dir.join("fraud_predictions_for_sql.csv");
        let excel_export = exports_dir.join("fraud_predictions_for_excel.csv");
        exports::write_sql_export(&sql_export, &outcome.split.test, &outcome.predictions)?;
        exports::write_excel_export(&excel_export, &outcome.split.test, &outcome.predictions)?;
        let powerbi_export = exports_dir.join("fraud_detection_powerbi.csv");
        exports::write_powerbi_export(&powerbi_export, &outcome.split.test, &outcome.predictions)?;
        let fraud_by_hour_csv = exports_dir.join("fraud_by_hour.csv");
        exports::write_hour_summary(&fraud_by_hour_csv, &outcome.split.test, &outcome.predictions)?;
        let risk_summary_csv = exports_dir.join("risk_summary.csv");
        exports::write_risk_summary(&risk_summary_csv, &outcome.predictions)?;
        let amount_distribution_csv = exports_dir.join("amount_distribution.csv");
        exports::write_amount_distribution(&amount_distribution_csv, &outcome.split.test)?;

        tracing::info!(
            run_id = %outcome.run_id,
            models = model_paths.len(),
            selected = %selected_model.display(),
            "saved run artifacts"
        );

        Ok(ArtifactPaths {
            cleaned_csv,
            train_csv,
            test_csv,
            models: model_paths,
            selected_model,
            model_info_csv,
            model_info_json,
            importance_csv,
            comparison_csv,
            cross_validation_csv,
            confusion_json,
            sql_export,
            excel_export,
            powerbi_export,
            fraud_by_hour_csv,
            risk_summary_csv,
            amount_distribution_csv,
        })
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T, what: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {what}"))?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {what} to {}", path.display()))?;
    Ok(())
}

fn finish_csv(mut wtr: csv::Writer<std::fs::File>, path: &Path) -> Result<()> {
    wtr.flush()
        .with_context(|| format!("Failed to flush {}", path.display()))
}

fn create_csv(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::Writer::from_path(path).with_context(|| format!("Failed to create {}", path.display()))
}

/// Format a 0/1 flag.
fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}
