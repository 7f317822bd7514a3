//! Model and metadata export (JSON/CSV).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use fraudlab_core::models::{ModelKind, TrainedModel};

use super::{create_csv, finish_csv, write_json};
use crate::result::{default_schema_version, ModelMetadata, SCHEMA_VERSION};

/// A persisted model together with the feature order it expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub kind: ModelKind,
    pub feature_names: Vec<String>,
    pub model: TrainedModel,
}

pub fn write_model_json(path: &Path, model: &TrainedModel, feature_names: &[String]) -> Result<()> {
    let artifact = ModelArtifact {
        schema_version: SCHEMA_VERSION,
        kind: model.kind(),
        feature_names: feature_names.to_vec(),
        model: model.clone(),
    };
    write_json(path, &artifact, "model")
}

/// Read a model written by a run. Newer schema versions are rejected.
pub fn load_model(path: &Path) -> Result<ModelArtifact> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read model {}", path.display()))?;
    let artifact: ModelArtifact = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse model {}", path.display()))?;
    if artifact.schema_version > SCHEMA_VERSION {
        bail!(
            "model {} has schema version {}, newer than supported version {}",
            path.display(),
            artifact.schema_version,
            SCHEMA_VERSION
        );
    }
    if artifact.kind != artifact.model.kind() {
        bail!(
            "model {} is tagged {} but holds a {} model",
            path.display(),
            artifact.kind,
            artifact.model.kind()
        );
    }
    Ok(artifact)
}

pub fn write_metadata_json(path: &Path, metadata: &ModelMetadata) -> Result<()> {
    write_json(path, metadata, "model metadata")
}

pub fn write_metadata_csv(path: &Path, metadata: &ModelMetadata) -> Result<()> {
    let mut wtr = create_csv(path)?;
    wtr.write_record([
        "model_name",
        "training_timestamp",
        "auc",
        "precision",
        "recall",
        "f1",
        "feature_count",
        "dataset_hash",
        "config_hash",
        "seed",
        "run_id",
    ])?;
    wtr.write_record([
        metadata.model_name.name().to_string(),
        metadata.training_timestamp.to_rfc3339(),
        format!("{:.6}", metadata.auc),
        format!("{:.6}", metadata.precision),
        format!("{:.6}", metadata.recall),
        format!("{:.6}", metadata.f1),
        metadata.feature_count.to_string(),
        metadata.dataset_hash.clone(),
        metadata.config_hash.clone(),
        metadata.seed.to_string(),
        metadata.run_id.clone(),
    ])?;
    finish_csv(wtr, path)
}
