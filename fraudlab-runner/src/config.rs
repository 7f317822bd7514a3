//! Pipeline configuration loaded from TOML.
//!
//! Every section is optional; omitted keys take their defaults, so an empty
//! file is a valid configuration. `validate()` rejects out-of-range values
//! before any stage runs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fraudlab_core::balance::BalanceConfig;
use fraudlab_core::evaluate::EvaluationConfig;
use fraudlab_core::fingerprint::ConfigHash;
use fraudlab_core::split::SplitConfig;
use fraudlab_core::train::TrainingConfig;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(String),
    #[error("invalid config value '{key}' = {value}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Complete configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Master seed for every random stream (default 42).
    pub seed: u64,
    pub split: SplitConfig,
    pub balance: BalanceConfig,
    pub training: TrainingConfig,
    pub evaluation: EvaluationConfig,
    pub paths: PathsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            split: SplitConfig::default(),
            balance: BalanceConfig::default(),
            training: TrainingConfig::default(),
            evaluation: EvaluationConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

/// Input file and output directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_data: PathBuf,
    pub processed_dir: PathBuf,
    pub models_dir: PathBuf,
    pub analysis_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub exports_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data: PathBuf::from("data/raw/creditcard.csv"),
            processed_dir: PathBuf::from("data/processed"),
            models_dir: PathBuf::from("models"),
            analysis_dir: PathBuf::from("model_analysis"),
            reports_dir: PathBuf::from("reports"),
            exports_dir: PathBuf::from("exports"),
        }
    }
}

impl PathsConfig {
    /// Every output directory placed under `root`; the input path is kept.
    pub fn rooted_at(&self, root: &Path) -> Self {
        Self {
            raw_data: self.raw_data.clone(),
            processed_dir: root.join(&self.processed_dir),
            models_dir: root.join(&self.models_dir),
            analysis_dir: root.join(&self.analysis_dir),
            reports_dir: root.join(&self.reports_dir),
            exports_dir: root.join(&self.exports_dir),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Deterministic hash of everything that influences results. Paths are
    /// excluded so relocating outputs does not change the run identity.
    pub fn config_hash(&self) -> Result<ConfigHash, ConfigError> {
        let mut hashed = self.clone();
        hashed.paths = PathsConfig::default();
        ConfigHash::of(&hashed).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fraction = self.split.test_fraction;
        check(
            fraction > 0.0 && fraction < 1.0,
            "split.test_fraction",
            fraction,
            "must lie strictly between 0 and 1",
        )?;
        for (key, ratio) in [
            ("balance.undersampling_ratio", self.balance.undersampling_ratio),
            ("balance.oversampling_ratio", self.balance.oversampling_ratio),
        ] {
            check(ratio > 0.0 && ratio <= 1.0, key, ratio, "must lie in (0, 1]")?;
        }
        check(
            self.balance.k_neighbors >= 1,
            "balance.k_neighbors",
            self.balance.k_neighbors,
            "must be at least 1",
        )?;

        let training = &self.training;
        check(
            training.cv_folds >= 2,
            "training.cv_folds",
            training.cv_folds,
            "must be at least 2",
        )?;
        check(
            !training.features.is_empty(),
            "training.features",
            "[]",
            "must name at least one feature",
        )?;
        let mut seen = HashSet::new();
        for feature in &training.features {
            check(
                seen.insert(*feature),
                "training.features",
                feature,
                "lists a feature twice",
            )?;
        }

        let models = &training.models;
        check(
            models.logistic.learning_rate > 0.0,
            "training.logistic.learning_rate",
            models.logistic.learning_rate,
            "must be positive",
        )?;
        check(
            models.logistic.l2 >= 0.0,
            "training.logistic.l2",
            models.logistic.l2,
            "must not be negative",
        )?;
        check(
            models.forest.n_trees >= 1,
            "training.forest.n_trees",
            models.forest.n_trees,
            "must be at least 1",
        )?;
        check(
            models.forest.max_depth >= 1,
            "training.forest.max_depth",
            models.forest.max_depth,
            "must be at least 1",
        )?;
        check(
            models.boosting.learning_rate > 0.0,
            "training.boosting.learning_rate",
            models.boosting.learning_rate,
            "must be positive",
        )?;
        check(
            models.boosting.max_depth >= 1,
            "training.boosting.max_depth",
            models.boosting.max_depth,
            "must be at least 1",
        )?;

        let threshold = self.evaluation.fraud_threshold;
        check(
            (0.0..=1.0).contains(&threshold),
            "evaluation.fraud_threshold",
            threshold,
            "must lie in [0, 1]",
        )?;
        Ok(())
    }
}

fn check(
    ok: bool,
    key: &'static str,
    value: impl std::fmt::Display,
    reason: &'static str,
) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudlab_core::features::Feature;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.seed, 42);
        assert_eq!(config.training.features.len(), 34);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            seed = 7

            [balance]
            k_neighbors = 3

            [training]
            cv_folds = 3
            features = ["V1", "V2", "Amount_Log"]

            [training.forest]
            n_trees = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.balance.k_neighbors, 3);
        assert_eq!(config.balance.undersampling_ratio, 0.5);
        assert_eq!(config.training.cv_folds, 3);
        assert_eq!(config.training.models.forest.n_trees, 10);
        assert_eq!(config.training.models.forest.max_depth, 12);
        assert_eq!(
            config.training.features,
            vec![Feature::Component(0), Feature::Component(1), Feature::AmountLog]
        );
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = PipelineConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(PipelineConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn unknown_feature_is_a_parse_error() {
        let err = PipelineConfig::from_toml("[training]\nfeatures = [\"V99\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for text in [
            "[split]\ntest_fraction = 1.0",
            "[balance]\nundersampling_ratio = 0.0",
            "[balance]\noversampling_ratio = 1.5",
            "[training]\ncv_folds = 1",
            "[training]\nfeatures = [\"V1\", \"V1\"]",
            "[evaluation]\nfraud_threshold = 2.0",
        ] {
            let err = PipelineConfig::from_toml(text).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }), "{text}");
        }
    }

    #[test]
    fn config_hash_ignores_paths() {
        let a = PipelineConfig::default();
        let mut b = a.clone();
        b.paths.models_dir = PathBuf::from("elsewhere");
        let mut c = a.clone();
        c.seed = 43;
        assert_eq!(a.config_hash().unwrap(), b.config_hash().unwrap());
        assert_ne!(a.config_hash().unwrap(), c.config_hash().unwrap());
    }
}
