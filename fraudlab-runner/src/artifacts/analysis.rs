//! Model analysis tables and the data profile report.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use fraudlab_core::evaluate::EvaluationResult;
use fraudlab_core::metrics::ConfusionMatrix;
use fraudlab_core::models::ModelKind;
use fraudlab_core::profile::DataProfile;
use fraudlab_core::train::{RankedFeature, TrainedEntry};

use super::{create_csv, finish_csv, write_json};

pub fn write_importance_csv(path: &Path, ranked: &[RankedFeature]) -> Result<()> {
    let mut wtr = create_csv(path)?;
    wtr.write_record(["rank", "feature", "importance"])?;
    for r in ranked {
        wtr.write_record([
            r.rank.to_string(),
            r.feature.clone(),
            format!("{:.6}", r.importance),
        ])?;
    }
    finish_csv(wtr, path)
}

pub fn write_comparison_csv(path: &Path, results: &[EvaluationResult]) -> Result<()> {
    let mut wtr = create_csv(path)?;
    wtr.write_record(["Model", "AUC", "Precision", "Recall", "F1 Score"])?;
    for r in results {
        wtr.write_record([
            r.kind.name().to_string(),
            format!("{:.6}", r.auc),
            format!("{:.6}", r.precision),
            format!("{:.6}", r.recall),
            format!("{:.6}", r.f1),
        ])?;
    }
    finish_csv(wtr, path)
}

/// Families whose cross-validation was skipped get no row.
pub fn write_cross_validation_csv(path: &Path, entries: &[TrainedEntry]) -> Result<()> {
    let mut wtr = create_csv(path)?;
    wtr.write_record(["Model", "CV AUC Mean", "CV AUC Std", "Folds"])?;
    for entry in entries {
        let Some(cv) = &entry.cv else { continue };
        wtr.write_record([
            entry.kind.name().to_string(),
            format!("{:.6}", cv.mean_auc),
            format!("{:.6}", cv.std_auc),
            cv.folds.to_string(),
        ])?;
    }
    finish_csv(wtr, path)
}

#[derive(Serialize)]
struct ConfusionRecord {
    model: ModelKind,
    /// `[[tn, fp], [fn, tp]]`
    matrix: [[usize; 2]; 2],
    counts: ConfusionMatrix,
}

pub fn write_confusion_json(path: &Path, results: &[EvaluationResult]) -> Result<()> {
    let records: Vec<ConfusionRecord> = results
        .iter()
        .map(|r| ConfusionRecord {
            model: r.kind,
            matrix: r.confusion.as_matrix(),
            counts: r.confusion,
        })
        .collect();
    write_json(path, &records, "confusion matrices")
}

pub fn write_profile_json(path: &Path, profile: &DataProfile) -> Result<()> {
    write_json(path, profile, "data profile")
}
