//! Prepared dataset CSVs and the cached feature statistics.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use fraudlab_core::domain::COMPONENT_COUNT;
use fraudlab_core::features::{Feature, FeatureStats, PreparedRecord};
use fraudlab_core::fingerprint::DatasetHash;
use fraudlab_core::schema::expected_columns;

use super::{create_csv, finish_csv, write_json};
use crate::result::{default_schema_version, SCHEMA_VERSION};

/// On-disk form of `feature_stats.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsArtifact {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub dataset_hash: DatasetHash,
    pub stats: FeatureStats,
}

pub fn write_feature_stats(path: &Path, stats: &FeatureStats, dataset_hash: &DatasetHash) -> Result<()> {
    let artifact = StatsArtifact {
        schema_version: SCHEMA_VERSION,
        dataset_hash: dataset_hash.clone(),
        stats: stats.clone(),
    };
    write_json(path, &artifact, "feature statistics")
}

/// `None` when the file is absent or was written for another dataset.
pub fn load_feature_stats(path: &Path, dataset_hash: &DatasetHash) -> Result<Option<FeatureStats>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let artifact: StatsArtifact = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    if artifact.schema_version > SCHEMA_VERSION {
        bail!(
            "{} has schema version {}, newer than supported version {}",
            path.display(),
            artifact.schema_version,
            SCHEMA_VERSION
        );
    }
    if &artifact.dataset_hash != dataset_hash {
        tracing::info!(
            cached = %artifact.dataset_hash,
            current = %dataset_hash,
            "cached feature statistics belong to another dataset; recomputing"
        );
        return Ok(None);
    }
    Ok(Some(artifact.stats))
}

/// Raw columns in canonical order followed by every derived feature.
pub fn write_prepared_csv(path: &Path, records: &[PreparedRecord]) -> Result<()> {
    let mut wtr = create_csv(path)?;
    let mut header = expected_columns();
    header.extend(Feature::derived().iter().map(Feature::name));
    wtr.write_record(&header)?;

    for record in records {
        wtr.write_record(prepared_fields(record))?;
    }
    finish_csv(wtr, path)
}

/// Field values matching `expected_columns()` plus `Feature::derived()`.
pub(super) fn prepared_fields(record: &PreparedRecord) -> Vec<String> {
    let t = &record.transaction;
    let mut fields = Vec::with_capacity(COMPONENT_COUNT + 11);
    fields.push(t.time.to_string());
    fields.extend(t.components.iter().map(f64::to_string));
    fields.push(t.amount.to_string());
    fields.push(t.label.class_value().to_string());
    fields.extend(Feature::derived().iter().map(|f| f.value(record).to_string()));
    fields
}
