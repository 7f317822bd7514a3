//! FraudLab Runner — pipeline orchestration and persistence.
//!
//! This crate builds on `fraudlab-core` to provide:
//! - TOML configuration with defaults and validation
//! - Raw transaction CSV loading with schema checks
//! - Pipeline driver with stage-tagged errors
//! - Artifact persistence (models, metadata, analysis tables, exports)
//! - Tracing subscriber setup

pub mod artifacts;
pub mod config;
pub mod data_loader;
pub mod logging;
pub mod pipeline;
pub mod result;

pub use artifacts::{
    load_model, transaction_hour, AmountRange, ArtifactManager, ArtifactPaths, ModelArtifact, RiskBin,
    RiskCategory,
};
pub use config::{ConfigError, PathsConfig, PipelineConfig};
pub use data_loader::{load_transactions, read_transactions, DataFormatError, LoadError, LoadedData};
pub use pipeline::{run_from_files, run_pipeline, PipelineError, RunSummary, Stage};
pub use result::{ModelMetadata, PipelineOutcome, Prediction, SelectedModel, SCHEMA_VERSION};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn pipeline_outcome_is_send_sync() {
        assert_send::<PipelineOutcome>();
        assert_sync::<PipelineOutcome>();
    }

    #[test]
    fn pipeline_config_is_send_sync() {
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
    }

    #[test]
    fn pipeline_error_is_send_sync() {
        assert_send::<PipelineError>();
        assert_sync::<PipelineError>();
    }
}
