//! FraudLab Core — imbalance-aware fraud classification, pure computation.
//!
//! This crate holds every stage of the training pipeline that does not touch
//! the filesystem:
//! - Domain types (transactions, labels, sample identities)
//! - Raw schema validation and feature derivation
//! - Stratified split and two-stage class balancing
//! - Three classifier families behind one `Classifier` trait
//! - Cross-validation, test-set metrics and best-model selection
//! - Deterministic RNG hierarchy and run fingerprints

pub mod balance;
pub mod cv;
pub mod dataset;
pub mod domain;
pub mod evaluate;
pub mod features;
pub mod fingerprint;
pub mod metrics;
pub mod models;
pub mod profile;
pub mod rng;
pub mod schema;
pub mod split;
pub mod train;
