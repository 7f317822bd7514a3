//! Run fingerprinting: deterministic identification of datasets and configurations.
//!
//! - `DatasetHash`: content hash over every loaded transaction.
//! - `ConfigHash`: hash of a configuration's canonical JSON.
//! - `RunId`: dataset + config + seed, the identity of one pipeline run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Transaction;

/// Deterministic dataset hash (BLAKE3 over the raw numeric values, in file order).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn of_transactions(records: &[Transaction]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(records.len() as u64).to_le_bytes());
        for r in records {
            hasher.update(&(r.id as u64).to_le_bytes());
            hasher.update(&r.time.to_le_bytes());
            for v in &r.components {
                hasher.update(&v.to_le_bytes());
            }
            hasher.update(&r.amount.to_le_bytes());
            hasher.update(&[r.label.class_value()]);
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic configuration hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl ConfigHash {
    /// Hash the canonical JSON form of any serializable configuration.
    ///
    /// Struct fields serialize in declaration order, so the JSON is stable
    /// for a given type.
    pub fn of<T: Serialize>(config: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(config)?;
        Ok(Self(blake3::hash(json.as_bytes()).to_hex().to_string()))
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic run identity (config + dataset + seed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId {
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
    pub seed: u64,
}

impl RunId {
    pub fn new(config_hash: ConfigHash, dataset_hash: DatasetHash, seed: u64) -> Self {
        Self {
            config_hash,
            dataset_hash,
            seed,
        }
    }

    /// Short hex digest suitable for file names and log lines.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.config_hash.0.as_bytes());
        hasher.update(self.dataset_hash.0.as_bytes());
        hasher.update(&self.seed.to_le_bytes());
        let hex = hasher.finalize().to_hex();
        hex.as_str()[..16].to_string()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.digest())
    }
}
